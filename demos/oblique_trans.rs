use std::error::Error;
use std::env::args;
use std::process;

use lpr_synth::image_process::{ self, Transform3D };

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = args();
    args.next();
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: oblique_trans <image> [angle_x angle_y angle_z]");
            process::exit(1);
        }
    };
    let angles: Vec<f64> = args.map(|a| a.parse()).collect::<Result<_, _>>()?;
    let (x, y, z) = match angles.as_slice() {
        [x, y, z] => (*x, *y, *z),
        _ => (10.0, -30.0, 5.0),
    };

    let img = image::open(path)?.to_rgb8();
    let transform = Transform3D::new(x, y, z)?;
    let after_trans = image_process::change_angle(&img, &transform)?;
    after_trans.save("oblique_trans.jpg")?;
    println!("corners: {:?}", transform.project_corners(img.width(), img.height())?);

    Ok(())
}
