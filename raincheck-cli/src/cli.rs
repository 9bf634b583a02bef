use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Select, Text};

use raincheck_core::{
    Config, ConfiguredPosition, Coordinates, DurationMinutes, Error, ForecastPipeline,
    ForecastResult, ForecastSource, LocationResolver, PlaceCandidate, Resolution,
    geocode::MIN_QUERY_LEN,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "raincheck", version, about = "Will it rain during my outing?")]
pub struct Cli {
    /// Print debug logs to stderr (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Suggest places matching a partial name.
    Search {
        query: String,
    },

    /// Name the place at the given coordinates.
    Locate {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Pick a place and a duration, then get the go/no-go verdict.
    Check {
        /// Place name; prompted for when no location option is given.
        query: Option<String>,

        #[arg(long, requires = "lon", allow_negative_numbers = true, conflicts_with = "query")]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Use the configured home position.
        #[arg(long, conflicts_with_all = ["query", "lat", "lon"])]
        here: bool,

        /// Outing length in minutes; prompted for when absent.
        #[arg(short, long)]
        duration: Option<u32>,
    },

    /// Show the effective configuration.
    Config,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        tracing::debug!(?config, "effective configuration");

        match self.command {
            Command::Search { query } => search(&config, &query).await,
            Command::Locate { lat, lon } => {
                let coordinates = Coordinates::new(lat, lon).validate()?;
                let resolver = LocationResolver::from_config(&config)?;
                println!("{}", resolver.reverse_lookup(coordinates).await);
                Ok(())
            }
            Command::Check { query, lat, lon, here, duration } => {
                let target = match (query, lat.zip(lon), here) {
                    (_, _, true) => Target::Here,
                    (_, Some((lat, lon)), _) => Target::At(Coordinates::new(lat, lon)),
                    (Some(query), _, _) => Target::Named(query),
                    (None, None, false) => Target::Ask,
                };
                check(&config, target, duration).await
            }
            Command::Config => {
                let path = Config::config_file_path()?;
                println!("# {}", path.display());
                print!("{}", config.to_toml_string()?);
                Ok(())
            }
        }
    }
}

enum Target {
    Here,
    At(Coordinates),
    Named(String),
    Ask,
}

async fn search(config: &Config, query: &str) -> anyhow::Result<()> {
    if query.trim().chars().count() < MIN_QUERY_LEN {
        println!("Type at least {MIN_QUERY_LEN} characters to get suggestions.");
        return Ok(());
    }

    let resolver = LocationResolver::from_config(config)?;
    match resolver.forward_search(query).await {
        Ok(candidates) => {
            for candidate in candidates {
                println!("{}  ({})", candidate.display_name, candidate.coordinates);
            }
            Ok(())
        }
        Err(Error::NotFound(_)) => {
            println!("No suggestions.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn check(config: &Config, target: Target, duration: Option<u32>) -> anyhow::Result<()> {
    let resolver = LocationResolver::from_config(config)?;
    let place = pick_place(config, &resolver, target).await?;

    let duration = match duration {
        Some(minutes) => DurationMinutes::new(minutes)?,
        None => pick_duration(&place)?,
    };

    println!("Checking the sky over {place} for the next {duration}...");
    let pipeline = ForecastPipeline::from_config(config)?;
    let result = pipeline.run(place.coordinates, duration).await;

    render(&place, &result);
    Ok(())
}

async fn pick_place(
    config: &Config,
    resolver: &LocationResolver,
    target: Target,
) -> anyhow::Result<PlaceCandidate> {
    let query = match target {
        Target::Here => {
            return match resolver.locate(&ConfiguredPosition::new(config.home)).await {
                Ok(place) => Ok(place),
                Err(Error::Geolocation(e)) => bail!("{}", e.guidance()),
                Err(e) => Err(e.into()),
            };
        }
        Target::At(coordinates) => {
            let coordinates = coordinates.validate()?;
            let display_name = resolver.reverse_lookup(coordinates).await;
            return Ok(PlaceCandidate { coordinates, display_name });
        }
        Target::Named(query) => query,
        Target::Ask => Text::new("Where are you heading?").prompt()?,
    };

    if query.trim().is_empty() {
        bail!("No place given.");
    }

    match resolver.resolve_query(&query).await {
        Ok(Resolution::Selected(place)) => Ok(place),
        Ok(Resolution::Ambiguous(candidates)) => Select::new("Several places match, pick one:", candidates)
            .prompt()
            .context("No place selected"),
        Err(Error::NotFound(_)) => {
            bail!("Couldn't find that place. Check the spelling or try a nearby town.")
        }
        Err(e) => Err(e).context("Place search failed, try again in a moment"),
    }
}

fn pick_duration(place: &PlaceCandidate) -> anyhow::Result<DurationMinutes> {
    let default_index = DurationMinutes::PRESETS
        .iter()
        .position(|&m| m == DurationMinutes::DEFAULT.get())
        .unwrap_or(0);

    let minutes = Select::new(
        &format!("In {place}, you plan to be out for... (minutes)"),
        DurationMinutes::PRESETS.to_vec(),
    )
    .with_starting_cursor(default_index)
    .prompt()?;

    Ok(DurationMinutes::new(minutes)?)
}

fn render(place: &PlaceCandidate, result: &ForecastResult) {
    let tier = result.risk_tier;

    println!();
    println!("[{}] {}", tier.verdict().to_uppercase(), tier.headline());
    println!("{}", tier.advice());
    println!("{}°C  ·  {}", result.current_temperature_c, place.display_name);

    if result.source == ForecastSource::Fallback {
        println!("(Forecast service unreachable; this is an estimate.)");
    }
}
