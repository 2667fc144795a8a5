use std::process::Command;

use crate::config::TrainArgs;

/// Error types for the training glue.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    /// The training program could not be spawned
    #[error("failed to launch {0}: {1}")]
    Spawn(String, std::io::Error),

    /// The training program exited with a failure status
    #[error("{0} exited with status {1}")]
    Failed(String, std::process::ExitStatus),
}

/// Invoke the external training program with the configured hyperparameters.
///
/// This is process glue only: stdio is inherited and the exit status is the
/// verdict. The default program is the `yolov5` CLI.
pub fn run_train(args: &TrainArgs) -> Result<(), TrainError> {
    let mut command = Command::new(&args.program);
    command
        .arg("train")
        .arg("--data")
        .arg(&args.data)
        .arg("--img")
        .arg(args.img_size.to_string())
        .arg("--batch-size")
        .arg(args.batch_size.to_string())
        .arg("--epochs")
        .arg(args.epochs.to_string())
        .arg("--workers")
        .arg(args.workers.to_string())
        .arg("--name")
        .arg(&args.name);

    command
        .arg("--weights")
        .arg(args.weights.as_deref().unwrap_or(""));
    if let Some(cfg) = &args.cfg {
        command.arg("--cfg").arg(cfg);
    }
    if let Some(hyp) = &args.hyp {
        command.arg("--hyp").arg(hyp);
    }
    if let Some(project) = &args.project {
        command.arg("--project").arg(project);
    }

    log::info!("Launching training: {:?}", command);
    let status = command
        .status()
        .map_err(|e| TrainError::Spawn(args.program.clone(), e))?;
    if !status.success() {
        return Err(TrainError::Failed(args.program.clone(), status));
    }
    log::info!("Training completed successfully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base_args() -> TrainArgs {
        TrainArgs {
            data: PathBuf::from("data.yaml"),
            program: "true".to_string(),
            cfg: None,
            hyp: None,
            weights: None,
            img_size: 416,
            batch_size: 1,
            epochs: 100,
            project: None,
            name: "pipeline".to_string(),
            workers: 0,
        }
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let mut args = base_args();
        args.program = "definitely-not-a-real-program".to_string();
        assert!(matches!(run_train(&args), Err(TrainError::Spawn(_, _))));
    }

    #[cfg(unix)]
    #[test]
    fn successful_exit_status_is_ok() {
        // `true` ignores its arguments and exits 0
        assert!(run_train(&base_args()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_status_is_reported() {
        let mut args = base_args();
        args.program = "false".to_string();
        assert!(matches!(run_train(&args), Err(TrainError::Failed(_, _))));
    }
}
