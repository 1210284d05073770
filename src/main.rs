use clap::{ value_t, App, AppSettings, Arg, ArgMatches, SubCommand };
use env_logger::Env;
use log::info;

use std::error::Error;
use std::path::PathBuf;

use lpr_synth::batch::{ gen_batch, BatchConfig };
use lpr_synth::plate_string::Pin;
use lpr_synth::{ GenConfig, GenPlate, PlateKind };


fn plate_command(name: &'static str, about: &'static str, out_dir: &'static str, make_num: &'static str) -> App<'static, 'static> {
    SubCommand::with_name(name)
        .about(about)
        .arg(Arg::with_name("font_ch").long("font_ch").takes_value(true)
            .default_value("./font/platech.ttf").help("font for province abbreviations"))
        .arg(Arg::with_name("font_en").long("font_en").takes_value(true)
            .default_value("./font/platechar.ttf").help("font for letters and digits"))
        .arg(Arg::with_name("template").long("template").takes_value(true)
            .help("plate background template"))
        .arg(Arg::with_name("bg_dir").long("bg_dir").takes_value(true)
            .default_value("./NoPlates").help("directory of background images without plates"))
        .arg(Arg::with_name("out_dir").long("out_dir").takes_value(true)
            .default_value(out_dir).help("output directory"))
        .arg(Arg::with_name("make_num").long("make_num").takes_value(true)
            .default_value(make_num).help("number of images to generate"))
        .arg(Arg::with_name("img_w").long("img_w").takes_value(true)
            .default_value("120").help("output image width"))
        .arg(Arg::with_name("img_h").long("img_h").takes_value(true)
            .default_value("32").help("output image height"))
        .arg(Arg::with_name("seed").long("seed").takes_value(true)
            .help("seed for reproducible output"))
        .arg(Arg::with_name("angle").long("angle")
            .help("tilt plates and remove the black border"))
        .arg(Arg::with_name("pin_pos").long("pin_pos").takes_value(true).requires("pin_char")
            .help("plate position forced to --pin_char"))
        .arg(Arg::with_name("pin_char").long("pin_char").takes_value(true).requires("pin_pos")
            .help("symbol placed at --pin_pos"))
}

fn run(kind: PlateKind, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let mut config = GenConfig::new(kind);
    config.font_ch = PathBuf::from(matches.value_of("font_ch").ok_or("font_ch is required")?);
    config.font_en = PathBuf::from(matches.value_of("font_en").ok_or("font_en is required")?);
    config.template = matches.value_of("template").map(PathBuf::from);
    config.bg_dir = PathBuf::from(matches.value_of("bg_dir").ok_or("bg_dir is required")?);

    let out_dir = matches.value_of("out_dir").ok_or("out_dir is required")?;
    let mut batch = BatchConfig::new(out_dir, value_t!(matches, "make_num", usize)?);
    batch.size = (value_t!(matches, "img_w", u32)?, value_t!(matches, "img_h", u32)?);
    batch.seed = if matches.is_present("seed") { Some(value_t!(matches, "seed", u64)?) } else { None };
    batch.angle = matches.is_present("angle");
    if matches.is_present("pin_pos") {
        let position = value_t!(matches, "pin_pos", usize)?;
        let symbol = matches.value_of("pin_char").and_then(|s| s.chars().next()).ok_or("pin_char must not be empty")?;
        batch.pin = Some(Pin { position, symbol });
    }

    let gen = GenPlate::new(&config)?;
    let report = gen_batch(&gen, &batch)?;
    info!("{} images written, {} skipped", report.written, report.skipped);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>>{
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new("lpr-synth")
                    .version("0.1.0")
                    .author("kingrong")
                    .about("Synthesizes labeled Chinese license plate images")
                    .setting(AppSettings::SubcommandRequiredElseHelp)
                    .subcommand(plate_command("common", "blue plates, white characters",
                        "./data/common_plate", "100"))
                    .subcommand(plate_command("green", "green new-energy plates, black characters",
                        "./data/green_plate_angle", "100"))
                    .subcommand(plate_command("scene", "blue plates placed in natural scenes, with location labels",
                        "./plate_train/", "10000"))
                    .get_matches();

    match matches.subcommand() {
        ("common", Some(m)) => run(PlateKind::Common, m),
        ("green", Some(m)) => run(PlateKind::Green, m),
        ("scene", Some(m)) => run(PlateKind::Scene, m),
        _ => Err("unknown subcommand".into()),
    }
}
