//! Runs a well-mixed Avida population from the command line.
//!
//! # Usage
//! ```text
//! avida [OPTIONS]
//! ```
//!
//! # Options
//! - `--config <file>`: `avida.cfg`-style settings (defaults otherwise)
//! - `--ancestor <file>`: organism listing to seed the population with
//! - `--hardware <heads|4stack>`: overrides `HARDWARE_TYPE`
//! - `--updates <n>`: updates to run (default 100)
//! - `--seed <n>`: overrides `RANDOM_SEED`
//! - `--test`: evaluate the ancestor on the test CPU instead of running
//! - `--quiet`: only report warnings and errors

use avida::config::AvidaConfig;
use avida::hardware::context::AvidaContext;
use avida::hardware::errors::HardwareError;
use avida::hardware::isa::HardwareKind;
use avida::test_cpu::landscape::{KnockoutClass, single_knockouts};
use avida::test_cpu::{CpuTestInfo, TestCpu};
use avida::utils::log::{Level, set_min_level};
use avida::world::{World, start_creature};
use avida::{error, info};
use std::env;
use std::process;
use std::sync::Arc;

const DEFAULT_UPDATES: u64 = 100;

struct Options {
    config: Option<String>,
    ancestor: Option<String>,
    hardware: Option<HardwareKind>,
    updates: u64,
    seed: Option<u64>,
    test: bool,
    quiet: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("avida");

    if args.iter().skip(1).any(|a| a == "--help" || a == "-h") {
        print_usage(program);
        process::exit(0);
    }

    let options = parse_args(program, &args[1..]);
    if options.quiet {
        set_min_level(Level::Warn);
    }

    let cfg = match load_config(&options) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = if options.test {
        run_test_cpu(&cfg)
    } else {
        run_world(&cfg, options.updates)
    };
    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn parse_args(program: &str, args: &[String]) -> Options {
    let mut options = Options {
        config: None,
        ancestor: None,
        hardware: None,
        updates: DEFAULT_UPDATES,
        seed: None,
        test: false,
        quiet: false,
    };

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "--ancestor" | "--hardware" | "--updates" | "--seed" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("{} requires an argument", flag);
                    process::exit(1);
                };
                match flag {
                    "--config" => options.config = Some(value.clone()),
                    "--ancestor" => options.ancestor = Some(value.clone()),
                    "--hardware" => {
                        options.hardware = Some(HardwareKind::from_name(value).unwrap_or_else(|| {
                            eprintln!("Unknown hardware type: {}", value);
                            process::exit(1);
                        }))
                    }
                    "--updates" => options.updates = parse_number(flag, value),
                    _ => options.seed = Some(parse_number(flag, value)),
                }
                i += 1;
            }
            "--test" => {
                options.test = true;
                i += 1;
            }
            "--quiet" => {
                options.quiet = true;
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(program);
                process::exit(1);
            }
        }
    }
    options
}

fn parse_number(flag: &str, value: &str) -> u64 {
    value.parse().unwrap_or_else(|_| {
        eprintln!("{} expects a non-negative integer, got '{}'", flag, value);
        process::exit(1);
    })
}

fn load_config(options: &Options) -> Result<AvidaConfig, HardwareError> {
    let mut cfg = match &options.config {
        Some(path) => AvidaConfig::load(path)?,
        None => AvidaConfig::default(),
    };
    if let Some(kind) = options.hardware {
        cfg.hardware_type = kind;
    }
    if let Some(seed) = options.seed {
        cfg.random_seed = seed;
    }
    if let Some(path) = &options.ancestor {
        cfg.start_creature = Some(path.clone());
    }
    Ok(cfg)
}

fn run_world(cfg: &AvidaConfig, updates: u64) -> Result<(), HardwareError> {
    let mut world = World::new(cfg)?;
    let ancestor = world.start_creature(cfg)?;
    info!(
        "Seeding {} slots with a {}-instruction {} ancestor (seed {})",
        world.size(),
        ancestor.len(),
        cfg.hardware_type.name(),
        world.seed()
    );
    let center = cfg.world_x * (cfg.world_y / 2) + cfg.world_x / 2;
    world.inject(ancestor, center)?;

    for _ in 0..updates {
        let stats = world.run_update()?;
        if stats.organisms == 0 {
            info!("Population died out at update {}", stats.update);
            break;
        }
    }
    let faults: u64 = world.slot_faults().iter().sum();
    info!("Finished after {} updates, {} faults recorded", world.update(), faults);
    Ok(())
}

fn run_test_cpu(cfg: &AvidaConfig) -> Result<(), HardwareError> {
    let inst_set = Arc::new(cfg.instruction_set()?);
    let genome = start_creature(cfg, &inst_set)?;
    let cpu = TestCpu::from_config(cfg, inst_set);
    let info = CpuTestInfo {
        generation_tests: 2,
        time_mod: cfg.test_cpu_time_mod,
        ..CpuTestInfo::default()
    };

    let mut ctx = AvidaContext::from_config_seed(cfg.random_seed);
    let result = cpu.test_genome(&mut ctx, &info, &genome)?;
    println!("genome:          {}", genome.display(cpu.inst_set()));
    println!("length:          {}", genome.len());
    println!("viable:          {}", result.is_viable);
    println!("true breeding:   {}", result.is_true_breeding);
    println!("merit:           {}", result.merit);
    println!("gestation time:  {}", result.gestation_time);
    println!("fitness:         {:.6}", result.fitness);
    println!("copied/executed: {}/{}", result.copied_size, result.executed_size);

    let landscape = single_knockouts(&cpu, &ctx, &info, &genome)?;
    println!("knockouts:");
    for class in [
        KnockoutClass::Lethal,
        KnockoutClass::Detrimental,
        KnockoutClass::Neutral,
        KnockoutClass::Beneficial,
    ] {
        println!(
            "  {:<12} {:>4} ({:.1}%)",
            format!("{:?}", class).to_lowercase(),
            landscape.count(class),
            landscape.fraction(class) * 100.0
        );
    }
    Ok(())
}

const USAGE: &str = "\
Avida population driver

USAGE:
    {program} [OPTIONS]

OPTIONS:
    --config <file>      Settings in avida.cfg format (built-in defaults otherwise)
    --ancestor <file>    Organism listing, one instruction name per line
    --hardware <type>    heads or 4stack (overrides HARDWARE_TYPE)
    --updates <n>        Updates to run (default 100)
    --seed <n>           Random seed, 0 picks one from the clock
    --test               Evaluate the ancestor on the test CPU and exit
    --quiet              Only report warnings and errors
    -h, --help           Print this help message

EXAMPLES:
    # Default heads world from the built-in ancestor
    {program} --seed 7 --updates 500

    # Fitness and knockout profile of a custom 4stack organism
    {program} --hardware 4stack --ancestor my-org.org --test
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
