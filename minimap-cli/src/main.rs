use clap::Parser;
use std::path::PathBuf;
use std::process;

use minimap_core::{
    run, PatchSettings, DEFAULT_X_LEFT, DEFAULT_X_RIGHT, DEFAULT_Y_BOTTOM, DEFAULT_Y_TOP,
};

#[derive(Debug, Parser)]
#[command(
    name = "ff6-minimapgen",
    version,
    about = "Final Fantasy VI world mini-map generator"
)]
struct Args {
    /// The ROM path (.smc or .sfc); the image is patched in place.
    #[arg(short = 'r', long = "rom", value_name = "ROM")]
    rom: PathBuf,

    /// 1st X coord. from left, 0 to 63. Default: 41.
    #[arg(long, value_name = "X1")]
    x1: Option<u32>,

    /// 2nd X coord. from left, 1 to 64. Default: 49.
    #[arg(long, value_name = "X2")]
    x2: Option<u32>,

    /// 1st Y coord. from top, 0 to 63. Default: 42.
    #[arg(long, value_name = "Y1")]
    y1: Option<u32>,

    /// 2nd Y coord. from top, 1 to 64. Default: 56.
    #[arg(long, value_name = "Y2")]
    y2: Option<u32>,
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message} (see --help)");
    process::exit(1);
}

fn check_range(name: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        fail(&format!("{name} must be between {min} and {max}"));
    }
}

fn main() {
    let args = Args::parse();

    match args
        .rom
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("smc") | Some("sfc") => {}
        _ => fail("the ROM path must end in .smc or .sfc"),
    }

    // The four viewport coordinates are all-or-nothing: unless every one of
    // them is given, the defaults are used.
    let (x_left, x_right, y_top, y_bottom) = match (args.x1, args.x2, args.y1, args.y2) {
        (Some(x1), Some(x2), Some(y1), Some(y2)) => {
            check_range("x1", x1, 0, 63);
            check_range("x2", x2, 1, 64);
            check_range("y1", y1, 0, 63);
            check_range("y2", y2, 1, 64);
            if x1 >= x2 {
                fail("x1 must be smaller than x2");
            }
            if y1 >= y2 {
                fail("y1 must be smaller than y2");
            }
            (x1, x2, y1, y2)
        }
        _ => (
            DEFAULT_X_LEFT,
            DEFAULT_X_RIGHT,
            DEFAULT_Y_TOP,
            DEFAULT_Y_BOTTOM,
        ),
    };

    let settings = PatchSettings {
        rom_path: args.rom,
        x_left,
        x_right,
        y_top,
        y_bottom,
    };

    if let Err(err) = run(settings) {
        eprintln!("Error: {err}");
        process::exit(1);
    }

    println!("Operation completed!");
}
