pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "warrantly",
    about = "Warrantly pricing CLI",
    long_about = "Check warranty eligibility, price cover and add-ons, score MOT reliability, and inspect configuration.",
    after_help = "Examples:\n  warrantly eligibility --make Audi --model \"RS3 Sportback\" --year 2021\n  warrantly quote --make Vauxhall --model Astra --year 2016 --term 24months --add-on tyre\n  warrantly reliability --mot-file mot.json --mileage 42000\n  warrantly config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Check whether a vehicle can be covered")]
    Eligibility {
        #[arg(long)]
        make: String,
        #[arg(long, default_value = "")]
        model: String,
        #[arg(long, help = "Manufacture year; inferred from MOT history when omitted")]
        year: Option<i32>,
        #[arg(long, help = "MOT history JSON (array of tests or a vehicle record)")]
        mot_file: Option<PathBuf>,
    },
    #[command(about = "Price a vehicle across terms, payment methods and add-ons")]
    Quote(QuoteArgs),
    #[command(name = "add-ons", about = "Price optional add-ons for a payment term")]
    AddOns {
        #[arg(long, default_value = "12months")]
        term: String,
        #[arg(long = "add-on", help = "Add-on key; repeat for several")]
        add_ons: Vec<String>,
        #[arg(long, help = "Months of cover; defaults to the term length")]
        duration: Option<u32>,
    },
    #[command(about = "Score MOT history and return the reliability tier")]
    Reliability {
        #[arg(long)]
        mot_file: PathBuf,
        #[arg(long, help = "Current odometer reading in miles")]
        mileage: Option<u32>,
        #[arg(long, help = "Manufacture date, YYYY-MM-DD")]
        manufacture_date: Option<NaiveDate>,
    },
    #[command(about = "List the add-on catalog, base price ladder and reliability tiers")]
    Catalog,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Eligibility { make, model, year, mot_file } => {
            commands::eligibility::run(&make, &model, year, mot_file.as_deref())
        }
        Command::Quote(args) => commands::quote::run(args),
        Command::AddOns { term, add_ons, duration } => {
            commands::add_ons::run(&term, &add_ons, duration)
        }
        Command::Reliability { mot_file, mileage, manufacture_date } => {
            commands::reliability::run(&mot_file, mileage, manufacture_date)
        }
        Command::Catalog => commands::catalog::run(),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
