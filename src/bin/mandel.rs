// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate env_logger;
extern crate failure;
extern crate mandelbrot;
extern crate num;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use mandelbrot::{colour, Config, Controls, Kernel, Renderer, Strategy, Viewport};
use num::Complex;
use std::str::FromStr;
use std::time::{Duration, Instant};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    parse_pair(s, ',').map(|(re, im)| Complex { re, im })
}

fn parse_zoom(s: &str) -> Option<(f64, f64, f64)> {
    let parts: Result<Vec<f64>, _> = s.split(',').map(f64::from_str).collect();
    match parts.ok()?.as_slice() {
        [dx, dy, factor] if *factor > 0.0 => Some((*dx, *dy, *factor)),
        _ => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const LEFTLOWER: &str = "leftlower";
const RIGHTUPPER: &str = "rightupper";
const THREADS: &str = "threads";
const ITERATIONS: &str = "iterations";
const RADIUS: &str = "radius";
const ZOOM: &str = "zoom";
const STRATEGY: &str = "strategy";
const KERNEL: &str = "kernel";
const FILL_DELAY: &str = "fill-delay";
const WAIT: &str = "wait";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("mandel")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Progressive Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(false)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Also write a colour image to this file (png or pnm)"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("80x40")
                .validator(|s| match parse_pair::<u16>(&s, 'x') {
                    Some((w, h)) if w > 0 && h > 0 => Ok(()),
                    Some(_) => Err("Image size must be at least 1x1".to_string()),
                    None => Err("Could not parse output image size".to_string()),
                })
                .help("Size of the rendered frame"),
        )
        .arg(
            Arg::with_name(LEFTLOWER)
                .required(false)
                .long(LEFTLOWER)
                .short("l")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-2.5,-1.25")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse left lower corner"))
                .help("Left lower corner of the mandelbrot space"),
        )
        .arg(
            Arg::with_name(RIGHTUPPER)
                .required(false)
                .long(RIGHTUPPER)
                .short("r")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("1.5,1.25")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse right upper corner"))
                .help("Right upper corner of the mandelbrot space"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of threads to use (default: all of them)"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("200")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iterations before a point is taken to be in the set"),
        )
        .arg(
            Arg::with_name(RADIUS)
                .required(false)
                .long(RADIUS)
                .short("R")
                .takes_value(true)
                .default_value("2")
                .validator(|s| {
                    validate_range(
                        &s,
                        std::f64::MIN_POSITIVE,
                        std::f64::MAX,
                        "Could not parse escape radius",
                        "Escape radius must be positive",
                    )
                })
                .help("Escape radius"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .required(false)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .allow_hyphen_values(true)
                .validator(|s| match parse_zoom(&s) {
                    Some(_) => Ok(()),
                    None => Err("Zoom must be dx,dy,factor with a positive factor".to_string()),
                })
                .help("Zoom on the point at fraction dx,dy of the frame by factor; repeatable"),
        )
        .arg(
            Arg::with_name(STRATEGY)
                .required(false)
                .long(STRATEGY)
                .takes_value(true)
                .possible_values(&["progressive", "parallel"])
                .default_value("progressive")
                .help("Progressive refinement or one-shot rendering"),
        )
        .arg(
            Arg::with_name(KERNEL)
                .required(false)
                .long(KERNEL)
                .takes_value(true)
                .possible_values(&["auto", "scalar", "vector"])
                .default_value("auto")
                .help("Iteration kernel"),
        )
        .arg(
            Arg::with_name(FILL_DELAY)
                .required(false)
                .long(FILL_DELAY)
                .takes_value(true)
                .default_value("100")
                .validator(|s| validate_range(&s, 0, 60_000, "Could not parse fill delay", "Fill delay must be at most 60000ms"))
                .help("Milliseconds of stochastic sampling before the raster fill"),
        )
        .arg(
            Arg::with_name(WAIT)
                .required(false)
                .long(WAIT)
                .short("w")
                .takes_value(true)
                .default_value("10000")
                .validator(|s| validate_range(&s, 0, 3_600_000, "Could not parse wait", "Wait must be at most 3600000ms"))
                .help("Milliseconds to wait for the frame to converge"),
        )
        .get_matches()
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, failure::Error> {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| failure::format_err!("bad value for --{}", name))
}

fn render(matches: &ArgMatches) -> Result<(), failure::Error> {
    let (width, height) = matches
        .value_of(SIZE)
        .and_then(|s| parse_pair::<u16>(s, 'x'))
        .ok_or_else(|| failure::format_err!("bad value for --{}", SIZE))?;
    let (width, height) = (usize::from(width), usize::from(height));
    let leftlower = matches
        .value_of(LEFTLOWER)
        .and_then(parse_complex)
        .ok_or_else(|| failure::format_err!("bad value for --{}", LEFTLOWER))?;
    let rightupper = matches
        .value_of(RIGHTUPPER)
        .and_then(parse_complex)
        .ok_or_else(|| failure::format_err!("bad value for --{}", RIGHTUPPER))?;
    let viewport = Viewport::from_corners(leftlower, rightupper)?;

    let mut config = Config::detect().with_fill_delay(Duration::from_millis(value(matches, FILL_DELAY)?));
    if matches.is_present(THREADS) {
        config = config.with_threads(value(matches, THREADS)?);
    }
    config = match matches.value_of(KERNEL) {
        Some("scalar") => config.with_kernel(Kernel::Scalar),
        Some("vector") => config.with_kernel(Kernel::Vector),
        _ => config,
    };
    let strategy = match matches.value_of(STRATEGY) {
        Some("parallel") => Strategy::Parallel,
        _ => Strategy::Progressive,
    };

    let start = Instant::now();
    let mut renderer = Renderer::new(strategy, config)?;
    renderer.configure(viewport, value(matches, ITERATIONS)?, value(matches, RADIUS)?)?;
    for zoom in matches.values_of(ZOOM).into_iter().flatten() {
        if let Some((dx, dy, factor)) = parse_zoom(zoom) {
            renderer.zoom(dx, dy, factor)?;
        }
    }

    renderer.render(width, height)?;
    let wait = Duration::from_millis(value(matches, WAIT)?);
    let converged = match renderer.session() {
        Some(session) => session.wait_converged(wait),
        None => renderer.is_converged(),
    };
    if !converged {
        log::warn!("frame did not converge within {:?}; showing it as it stands", wait);
    }

    let counts = renderer.render(width, height)?.to_vec();
    let elapsed = start.elapsed();
    renderer.shutdown();

    if let Some(output) = matches.value_of(OUTPUT) {
        colour::colorize(&counts, width, height).save(output)?;
    }
    println!("{}", colour::ascii(&counts, width, height));
    eprintln!("{}", Controls::default().title(&renderer, elapsed));
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = args();
    if let Err(e) = render(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
