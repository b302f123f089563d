use clap::{App, Arg};
use regex::Regex;
use std::io;
use std::process;

use mmu_rust::constants::MAX_FRAMES;
use mmu_rust::pagers::{
    AgingPager, ClockPager, FifoPager, NruPager, Pager, RandomPager, WorkingSetPager,
};
use mmu_rust::simulator::Simulator;
use mmu_rust::utils::{read_input_file, read_random_file};

fn valid_algorithm(value: &str) -> Result<(), String> {
    let re = Regex::new(r"^[acefrw]$").unwrap();
    if re.is_match(value) {
        Ok(())
    } else {
        Err(format!(
            "invalid algorithm: {}. Must be one of f, r, c, e, a, w.",
            value
        ))
    }
}

fn main() {
    let matches = App::new("MMU program")
        .arg(
            Arg::with_name("num_frames")
                .short('f')
                .required(true)
                .help("number of frames")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("algorithm")
                .short('a')
                .required(true)
                .help("page replacement algorithm")
                .validator(valid_algorithm)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("options")
                .short('o')
                .help("output options (O, P, F, S)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("inputfile")
                .help("input file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("randomfile")
                .help("random file")
                .required(true)
                .index(2),
        )
        .get_matches();

    let num_frames: usize = match matches.value_of("num_frames").unwrap().parse() {
        Ok(n) if (1..=MAX_FRAMES).contains(&n) => n,
        _ => {
            eprintln!("Number of frames must be between 1 and {}.", MAX_FRAMES);
            process::exit(1);
        }
    };
    let algorithm = matches.value_of("algorithm").unwrap();
    let options = matches.value_of("options").unwrap_or("");
    let inputfile = matches.value_of("inputfile").unwrap();
    let randomfile = matches.value_of("randomfile").unwrap();

    if let Err(e) = run(num_frames, algorithm, options, inputfile, randomfile) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(
    num_frames: usize,
    algorithm: &str,
    options: &str,
    inputfile: &str,
    randomfile: &str,
) -> Result<(), String> {
    let randgen = read_random_file(randomfile)?;
    let (processes, instructions) = read_input_file(inputfile)?;

    let pager: Box<dyn Pager> = match algorithm {
        "f" => Box::new(FifoPager::new()),
        "r" => Box::new(RandomPager::new(randgen)),
        "c" => Box::new(ClockPager::new()),
        "e" => Box::new(NruPager::new()),
        "a" => Box::new(AgingPager::new()),
        "w" => Box::new(WorkingSetPager::new()),
        _ => unreachable!("algorithm validated by clap"),
    };

    let trace = options.contains('O');
    let mut sim = Simulator::new(num_frames, processes, pager, trace, io::stdout().lock());

    let report = |e: io::Error| format!("write failed: {}", e);
    sim.run(&instructions).map_err(report)?;
    if options.contains('P') {
        sim.print_page_tables().map_err(report)?;
    }
    if options.contains('F') {
        sim.print_frame_table().map_err(report)?;
    }
    if options.contains('S') {
        sim.print_process_stats().map_err(report)?;
        sim.print_summary().map_err(report)?;
    }
    Ok(())
}
