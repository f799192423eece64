/**
 * BookReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

extern crate bookreco;
extern crate getopts;
extern crate num_cpus;

use std::env;
use std::error::Error;
use std::io::{stdout, Write};
use std::path::{Path, PathBuf};
use std::process;

use getopts::Options;

use bookreco::io;
use bookreco::utils;
use bookreco::{Config, Recommender};

fn main() {

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("a", "artifacts", "Directory holding the feature matrix, the neighbor index and \
        the metadata table (optional, defaults to $BOOKRECO_ARTIFACTS_DIR or ./artifacts).", "PATH");
    opts.optopt("t", "title", "Title of the book to find similar books for. Must match a known \
        title exactly.", "TITLE");
    opts.optopt("b", "batch", "File with one title per line, recommendations for all of them are \
        computed in parallel.", "PATH");
    opts.optopt("k", "num-recommendations", "Number of books per recommendation, the queried \
        book included (optional, defaults to 6).", "NUMBER");
    opts.optopt("o", "outputfile", "Output file name (optional, output will be written to stdout \
        by default).", "PATH");
    opts.optflag("l", "list", "List all known titles");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    let num_modes = ["t", "b", "l"].iter().filter(|mode| matches.opt_present(mode)).count();
    if num_modes != 1 {
        return print_usage_and_exit(
            &program,
            opts,
            Some("Please specify exactly one of --title, --batch or --list."),
        );
    }

    utils::init_logging();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if let Some(dir) = matches.opt_str("a") {
        config.artifacts_dir = PathBuf::from(dir);
    }

    let default_k = config.num_recommendations;
    config.num_recommendations = match matches.opt_get_default("k", default_k) {
        Ok(k) => k,
        Err(failure) => {
            let hint = format!("Problem with option 'k': {}", failure.to_string());
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    let output_path = matches.opt_str("o");

    let outcome = if matches.opt_present("l") {
        list_titles(&config, output_path)
    } else if let Some(title) = matches.opt_str("t") {
        recommend_for_title(&config, title, output_path)
    } else {
        let titles_path = matches.opt_str("b").unwrap_or_default();
        recommend_for_batch(&config, &titles_path, output_path)
    };

    if let Err(failure) = outcome {
        eprintln!("{}", failure);
        process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
    process::exit(2);
}

fn list_titles(config: &Config, output_path: Option<String>) -> Result<(), Box<dyn Error>> {

    let recommender = Recommender::load(&config.artifacts_dir, config.hydration.clone())?;

    let mut out: Box<dyn Write> = match output_path {
        Some(path) => Box::new(std::fs::File::create(path)?),
        _ => Box::new(stdout())
    };

    for title in recommender.titles()? {
        writeln!(out, "{}", title)?;
    }

    Ok(())
}

fn recommend_for_title(
    config: &Config,
    title: String,
    output_path: Option<String>,
) -> Result<(), Box<dyn Error>> {

    let recommender = Recommender::load(&config.artifacts_dir, config.hydration.clone())?;

    let result = recommender.recommend(&title, config.num_recommendations);
    let found = result.is_ok();

    io::write_recommendations(&[(title, result)], output_path)?;

    if !found {
        return Err("No recommendations computed, the title is unknown. Use --list to see all \
            known titles.".into());
    }

    Ok(())
}

fn recommend_for_batch(
    config: &Config,
    titles_path: &str,
    output_path: Option<String>,
) -> Result<(), Box<dyn Error>> {

    let recommender = Recommender::load(&config.artifacts_dir, config.hydration.clone())?;

    let titles = io::read_titles(Path::new(titles_path))?;

    let results = recommender.recommend_all(&titles, config.num_recommendations, num_cpus::get())?;

    let num_unknown = results.iter().filter(|result| result.is_err()).count();
    if num_unknown > 0 {
        eprintln!("{} of {} titles are unknown.", num_unknown, titles.len());
    }

    let results: Vec<_> = titles.into_iter().zip(results.into_iter()).collect();
    io::write_recommendations(&results, output_path)?;

    Ok(())
}
