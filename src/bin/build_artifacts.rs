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

use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use getopts::Options;
use tracing::info;

use bookreco::builder;
use bookreco::io;
use bookreco::utils;
use bookreco::{ArtifactBundle, Config, Metric};

fn main() {

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("r", "ratings", "Ratings file (required), ';'-separated with the columns User-ID, \
        ISBN and Book-Rating.", "PATH");
    opts.optopt("b", "books", "Books file (required), ';'-separated with the columns ISBN, \
        Book-Title, Book-Author, Year-Of-Publication, Publisher and Image-URL-L.", "PATH");
    opts.optopt("g", "genres", "Genre file (optional), ','-separated with the columns ISBN and \
        genre.", "PATH");
    opts.optopt("o", "outputdir", "Directory to write the artifacts to (optional, defaults to \
        $BOOKRECO_ARTIFACTS_DIR or ./artifacts).", "PATH");
    opts.optopt("m", "metric", "Distance metric of the neighbor index: euclidean, manhattan or \
        cosine (optional, defaults to euclidean).", "NAME");
    opts.optopt("u", "min-user-ratings", "Users need more ratings than this to be retained \
        (optional, defaults to 150).", "NUMBER");
    opts.optopt("n", "min-book-ratings", "Books need at least this many ratings to be retained \
        (optional, defaults to 30).", "NUMBER");
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

    let (ratings_path, books_path) = match (matches.opt_str("r"), matches.opt_str("b")) {
        (Some(ratings_path), Some(books_path)) => (ratings_path, books_path),
        _ => {
            return print_usage_and_exit(
                &program,
                opts,
                Some("Please specify the input files via --ratings and --books."),
            );
        },
    };

    utils::init_logging();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if let Some(dir) = matches.opt_str("o") {
        config.artifacts_dir = PathBuf::from(dir);
    }

    if let Some(metric) = matches.opt_str("m") {
        config.metric = match metric.parse::<Metric>() {
            Ok(metric) => metric,
            Err(failure) => {
                let hint = format!("Problem with option 'm': {}", failure.to_string());
                return print_usage_and_exit(&program, opts, Some(&hint))
            },
        };
    }

    let defaults = config.builder;
    let thresholds = (
        matches.opt_get_default("u", defaults.user_rated_threshold),
        matches.opt_get_default("n", defaults.books_rated_threshold),
    );
    match thresholds {
        (Ok(user_rated_threshold), Ok(books_rated_threshold)) => {
            config.builder.user_rated_threshold = user_rated_threshold;
            config.builder.books_rated_threshold = books_rated_threshold;
        },
        (Err(failure), _) | (_, Err(failure)) => {
            let hint = format!("Problem with a threshold option: {}", failure.to_string());
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    }

    let genres_path = matches.opt_str("g");

    if let Err(failure) = build_artifacts(&config, &ratings_path, &books_path, genres_path) {
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

fn build_artifacts(
    config: &Config,
    ratings_path: &str,
    books_path: &str,
    genres_path: Option<String>,
) -> Result<(), Box<dyn Error>> {

    info!(path = ratings_path, "reading ratings (input 1/3)");
    let ratings = io::read_ratings(Path::new(ratings_path))?;

    info!(path = books_path, "reading books (input 2/3)");
    let books = io::read_books(Path::new(books_path))?;

    let genres = match genres_path {
        Some(path) => {
            info!(path = path.as_str(), "reading genres (input 3/3)");
            io::read_genres(Path::new(&path))?
        },
        None => {
            info!("no genre file given, genres will fall back to the unknown genre");
            Vec::new()
        },
    };

    let built = builder::build(&ratings, &books, &genres, &config.builder)?;

    info!(metric = %config.metric, "fitting neighbor index");
    let bundle = ArtifactBundle::new(built.matrix, config.metric, built.metadata);

    bundle.save(&config.artifacts_dir)?;

    Ok(())
}
