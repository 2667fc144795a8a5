use glob::glob;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::{SplitDirs, IMG_FORMATS};
use crate::utils::create_output_directory;

/// Collect background image files (by supported extension) in sorted order.
pub fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", dir.display()),
        ));
    }

    let mut entries: Vec<PathBuf> = IMG_FORMATS
        .iter()
        .flat_map(|ext| {
            let pattern = format!("{}/*.{}", dir.display(), ext);
            glob(&pattern)
                .into_iter()
                .flatten()
                .filter_map(|entry| entry.ok())
                .collect::<Vec<_>>()
        })
        .collect();
    entries.sort();
    Ok(entries)
}

/// Collect STL mesh files in sorted order; the sort fixes class id assignment.
pub fn list_meshes(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", dir.display()),
        ));
    }

    let mut entries: Vec<PathBuf> = ["stl", "STL"]
        .iter()
        .flat_map(|ext| {
            let pattern = format!("{}/*.{}", dir.display(), ext);
            glob(&pattern)
                .into_iter()
                .flatten()
                .filter_map(|entry| entry.ok())
                .collect::<Vec<_>>()
        })
        .collect();
    entries.sort();
    entries.dedup();
    Ok(entries)
}

/// Set up the train/valid/test directory trees for the dataset splitter.
pub fn setup_split_directories(root: &Path) -> std::io::Result<SplitDirs> {
    let train_dir = root.join("train");
    let valid_dir = root.join("valid");
    let test_dir = root.join("test");

    Ok(SplitDirs {
        train_images_dir: create_output_directory(&train_dir.join("images"))?,
        train_labels_dir: create_output_directory(&train_dir.join("labels"))?,
        valid_images_dir: create_output_directory(&valid_dir.join("images"))?,
        valid_labels_dir: create_output_directory(&valid_dir.join("labels"))?,
        test_images_dir: create_output_directory(&test_dir.join("images"))?,
        test_labels_dir: create_output_directory(&test_dir.join("labels"))?,
    })
}

/// Write the class map as `id name` lines, sorted by id.
pub fn write_classes_file(path: &Path, names: &[(usize, String)]) -> std::io::Result<()> {
    let mut sorted: Vec<_> = names.to_vec();
    sorted.sort_by_key(|&(id, _)| id);

    let mut writer = BufWriter::new(File::create(path)?);
    for (id, name) in sorted {
        writeln!(writer, "{} {}", id, name)?;
    }
    Ok(())
}

/// Read a classes file written by `write_classes_file` back into names sorted by id.
pub fn read_classes_file(path: &Path) -> std::io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let mut entries: Vec<(usize, String)> = Vec::new();
    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let mut fields = line.splitn(2, ' ');
        let id = fields
            .next()
            .and_then(|field| field.parse().ok())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed classes line: {line:?}"),
                )
            })?;
        let name = fields.next().unwrap_or("").to_string();
        entries.push((id, name));
    }
    entries.sort_by_key(|&(id, _)| id);
    Ok(entries.into_iter().map(|(_, name)| name).collect())
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(root: &Path, names: &[String]) -> std::io::Result<()> {
    let dataset_yaml_path = root.join("dataset.yaml");
    let mut dataset_yaml = BufWriter::new(File::create(&dataset_yaml_path)?);
    let absolute_path = fs::canonicalize(root)?;

    let mut yaml_content = format!(
        "path: {}\ntrain: train/images\nval: valid/images\ntest: test/images\n",
        absolute_path.to_string_lossy()
    );
    yaml_content.push_str("\nnames:\n");
    for (id, name) in names.iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, name));
    }
    dataset_yaml.write_all(yaml_content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_images_sorted_by_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.png", "notes.txt", "c.mp4"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let images = list_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn lists_meshes_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["sun_c.stl", "planet_c.stl", "readme.md"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let meshes = list_meshes(dir.path()).unwrap();
        assert_eq!(meshes.len(), 2);
        assert!(meshes[0].ends_with("planet_c.stl"));
    }

    #[test]
    fn classes_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.txt");
        write_classes_file(
            &path,
            &[(1, "planet_c".to_string()), (0, "lid_c".to_string())],
        )
        .unwrap();
        let names = read_classes_file(&path).unwrap();
        assert_eq!(names, vec!["lid_c".to_string(), "planet_c".to_string()]);
    }

    #[test]
    fn test_create_dataset_yaml() {
        let dir = tempfile::tempdir().unwrap();
        create_dataset_yaml(dir.path(), &["sun_c".to_string(), "lid_c".to_string()]).unwrap();
        let yaml_content = fs::read_to_string(dir.path().join("dataset.yaml")).unwrap();
        assert!(yaml_content.contains("path:"));
        assert!(yaml_content.contains("train: train/images"));
        assert!(yaml_content.contains("val: valid/images"));
        assert!(yaml_content.contains("test: test/images"));
        assert!(yaml_content.contains("0: sun_c"));
        assert!(yaml_content.contains("1: lid_c"));
    }
}
