use std::env;
use std::fs;
use std::process;

use mp4_box::reader::{extract_init_segment, parse_mp4_boxes, parse_segment_index};
use mp4_box::writer::{synthesize_init_segment, AudioParams, TrackInfo, TrackParams, VideoParams};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <mp4_file> | --sidx <mp4_file> [base_offset] | --synth <video|audio> <out_file>", args[0]);
        process::exit(1);
    }

    match args[1].as_str() {
        "--sidx" if args.len() >= 3 => {
            let base_offset = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
            run_sidx_mode(&args[2], base_offset);
        }
        "--synth" if args.len() >= 4 => run_synth_mode(&args[2], &args[3]),
        "--sidx" | "--synth" => {
            eprintln!("Missing arguments for {}", args[1]);
            process::exit(1);
        }
        filename => run_file_mode(filename),
    }
}

fn read_file(filename: &str) -> Vec<u8> {
    match fs::read(filename) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read file '{}': {}", filename, e);
            process::exit(1);
        }
    }
}

fn run_file_mode(filename: &str) {
    let data = read_file(filename);

    let boxes = match parse_mp4_boxes(&data) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to parse MP4 boxes: {}", e);
            process::exit(1);
        }
    };

    println!("Parsed {} top-level boxes from '{}':\n", boxes.len(), filename);
    for (i, mp4_box) in boxes.iter().enumerate() {
        println!("Box {}:\n{:#?}\n", i + 1, mp4_box);
    }

    match extract_init_segment(&data) {
        Ok(init) => println!("Initialization data: {} of {} bytes", init.len(), data.len()),
        Err(e) => eprintln!("Failed to locate initialization data: {}", e),
    }
}

fn run_sidx_mode(filename: &str, base_offset: u64) {
    let data = read_file(filename);

    match parse_segment_index(&data, base_offset) {
        Ok(references) => {
            println!("{} segment reference(s):", references.len());
            for (i, reference) in references.iter().enumerate() {
                println!(
                    "  #{:<4} offset {:>10}  size {:>8}  time {:>10.3}s  duration {:.3}s",
                    i, reference.offset, reference.size, reference.time, reference.duration
                );
            }
        }
        Err(e) => {
            eprintln!("Failed to parse segment index: {}", e);
            process::exit(1);
        }
    }
}

fn run_synth_mode(kind: &str, out_file: &str) {
    let params = match kind {
        "video" => TrackParams::Video(VideoParams {
            width: 1280,
            height: 720,
            sps: vec![0x67, 0x4D, 0x40, 0x1F, 0x96, 0x54, 0x02, 0x80, 0x2D, 0xC8],
            pps: vec![0x68, 0xEE, 0x3C, 0x80],
        }),
        "audio" => TrackParams::Audio(AudioParams {
            sample_rate: 48_000,
            audio_specific_config: vec![0x11, 0x90],
        }),
        other => {
            eprintln!("Unknown track kind '{}', expected video or audio", other);
            process::exit(1);
        }
    };

    let init = synthesize_init_segment(&TrackInfo { params, protection: None });
    println!("Generated INIT segment ({} bytes)", init.len());

    match parse_mp4_boxes(&init) {
        Ok(boxes) => {
            for (i, mp4_box) in boxes.iter().enumerate() {
                println!("Init Box {}:\n{:#?}\n", i + 1, mp4_box);
            }
        }
        Err(e) => {
            eprintln!("Failed to parse INIT segment: {}", e);
            process::exit(1);
        }
    }

    if let Err(e) = fs::write(out_file, &init) {
        eprintln!("Failed to write '{}': {}", out_file, e);
        process::exit(1);
    }
}
