use glam::DMat4;
use rand::Rng;
use std::f64::consts::PI;

// Tilt range for the x and y axes; the z axis spins freely.
const MAX_TILT: f64 = PI / 4.0;

/// Sample a random 3D rotation as a 4x4 homogeneous transform.
///
/// The x and y angles are drawn uniformly from [-pi/4, pi/4] and the z angle
/// from [0, 2*pi). The axis rotations compose as z * y * x, so the x rotation
/// is applied first.
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> DMat4 {
    let angle_x = rng.gen_range(-MAX_TILT..MAX_TILT);
    let angle_y = rng.gen_range(-MAX_TILT..MAX_TILT);
    let angle_z = rng.gen_range(0.0..2.0 * PI);

    DMat4::from_rotation_z(angle_z) * DMat4::from_rotation_y(angle_y) * DMat4::from_rotation_x(angle_x)
}
