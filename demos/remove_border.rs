use rand::thread_rng;

use std::error::Error;
use std::env::args;
use std::process;

use lpr_synth::image_process;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = args();
    args.next();
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("didn't get a image from args");
            process::exit(1);
        }
    };

    let img = image::open(path)?.to_rgb8();
    let after_fix = image_process::remove_border(&img, &mut thread_rng())?;
    println!("{}x{} -> {}x{}", img.width(), img.height(), after_fix.width(), after_fix.height());
    after_fix.save("remove_border.jpg")?;

    Ok(())
}
