use arousa_etl::app::pipelines::ctd_pipeline::CtdPipeline;
use arousa_etl::app::pipelines::mooring_pipeline::MooringPipeline;
use arousa_etl::app::pipelines::stations_pipeline::{StationsMode, StationsPipeline};
use arousa_etl::config::{self, Cli, Commands, StationsCommand};
use arousa_etl::db;
use arousa_etl::domain::ports::Pipeline;
use arousa_etl::download::BulkDownloader;
use arousa_etl::utils::{logger, validation::Validate};
use arousa_etl::{EtlEngine, LocalStorage, Result};
use clap::Parser;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting arousa-etl");

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Could not load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    // The one thing every run does first: .env secrets plus config
    // overrides, before any pipeline touches the outside world.
    let env_report = match config::env::init_environment(&config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ Environment initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    let monitor = cli.monitor;
    if monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let outcome: Result<()> = match cli.command {
        Commands::Init => {
            match &env_report.env_file {
                Some(path) => println!("✅ Environment file: {}", path.display()),
                None => println!("⚠️ No .env file found"),
            }
            println!("✅ Overrides applied: {}", env_report.applied_overrides);
            println!("✅ Configuration valid ({})", config.pipeline.name);
            Ok(())
        }
        Commands::Stations(args) => {
            let mode = match args.command {
                StationsCommand::Fetch => StationsMode::Fetch,
                StationsCommand::Seed => StationsMode::Seed,
            };
            let pipeline = StationsPipeline::new(LocalStorage::new("."), config.clone(), mode);
            run_pipeline(pipeline, monitor).await
        }
        Commands::Download(args) => {
            let start = args.start.unwrap_or(config.download.start_date);
            let end = args.end.unwrap_or_else(|| config.download_end_date());
            let downloader = BulkDownloader::new(config.clone());
            downloader.run(start, end).await.map(|stats| {
                println!("✅ Download finished: {}", stats.summary());
            })
        }
        Commands::Ctd => {
            let pipeline = CtdPipeline::new(LocalStorage::new("."), config.clone());
            run_pipeline(pipeline, monitor).await
        }
        Commands::Mooring => {
            let pipeline = MooringPipeline::new(LocalStorage::new("."), config.clone());
            run_pipeline(pipeline, monitor).await
        }
        Commands::Schema => match db::DbSettings::from_env() {
            Ok(settings) => db::create_schema(&settings).await,
            Err(e) => Err(e),
        },
        Commands::Rivers => arousa_etl::geo::rivers::run(&config).map(|written| {
            if written.is_none() {
                println!("⚠️ Filter selected no rivers; nothing written");
            }
        }),
        Commands::Coverage => arousa_etl::geo::coverage::run(&config).map(|path| {
            println!("✅ Coverage report: {}", path.display());
        }),
    };

    if let Err(e) = outcome {
        tracing::error!("❌ ETL process failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run_pipeline<P: Pipeline>(pipeline: P, monitor: bool) -> Result<()> {
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor);
    let output_path = engine.run().await?;

    println!("✅ ETL process completed successfully!");
    println!("📁 Output saved to: {}", output_path);
    Ok(())
}
