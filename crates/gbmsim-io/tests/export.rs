use approx::assert_relative_eq;
use arrow::datatypes::DataType;
use clap::Parser;
use gbmsim_core::{NoiseGenerator, ReturnStatistics, SimulationConfig};
use gbmsim_io::{
    run_simulate_command, write_ensemble_with_manifest, write_trace_csv, Cli, Commands, RunManifest,
    SimulationSettings,
};
use gbmsim_sampler::Sampler;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

fn sampler(paths: usize, steps: usize) -> Sampler {
    let stats = ReturnStatistics::new(0.0005, 0.015);
    let config = SimulationConfig::new(paths, steps, 1.0 / 252.0, 187.0).unwrap();
    Sampler::new(&stats, config).unwrap()
}

#[test]
fn trace_csv_has_empty_cells_at_step_zero() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("trace.csv");
    let trace = sampler(1, 10).trace_path(&mut NoiseGenerator::new(1));

    write_trace_csv(&trace, &out).unwrap();

    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["step", "normal", "log_increment", "price"]);

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 11);
    assert_eq!(&rows[0][0], "0");
    assert_eq!(&rows[0][1], "");
    assert_eq!(&rows[0][2], "");
    assert_relative_eq!(rows[0][3].parse::<f64>().unwrap(), 187.0);
    assert!(rows[1..].iter().all(|r| !r[1].is_empty() && !r[2].is_empty()));
}

#[test]
fn parquet_and_manifest_round_trip() {
    let dir = tempdir().unwrap();
    let parquet_path = dir.path().join("paths.parquet");
    let manifest_path = dir.path().join("paths.manifest.json");

    let sampler = sampler(4, 25);
    let ensemble = sampler.run_paths(&mut NoiseGenerator::new(3));
    let manifest = RunManifest::new(
        &ReturnStatistics::new(0.0005, 0.015),
        sampler.config(),
        3,
        false,
        None,
        None,
    );

    write_ensemble_with_manifest(&ensemble, &manifest, &parquet_path, &manifest_path).unwrap();

    let reader = SerializedFileReader::new(File::open(&parquet_path).unwrap()).unwrap();
    assert_eq!(reader.metadata().file_metadata().num_rows(), 4 * 26);

    let loaded = RunManifest::load_from_file(&manifest_path).unwrap();
    assert_eq!(loaded.run_id, manifest.run_id);
    assert_eq!(loaded.n_paths, 4);
    assert_eq!(loaded.n_steps, 25);
    assert_relative_eq!(loaded.initial_price, 187.0);
    assert_relative_eq!(loaded.step_size, 1.0 / 252.0);

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&parquet_path).unwrap()).unwrap();
    let schema = builder.schema();
    assert_eq!(schema.field_with_name("path_id").unwrap().data_type(), &DataType::UInt64);
    assert_eq!(schema.field_with_name("step").unwrap().data_type(), &DataType::UInt64);
}

#[test]
fn flags_override_settings() {
    let cli = Cli::try_parse_from([
        "gbmsim", "simulate", "--mu", "0.001", "--sigma", "0.02", "--s0", "100", "--paths", "50",
        "--returns", "log",
    ])
    .unwrap();
    let Commands::Simulate(args) = cli.command else {
        panic!("expected simulate");
    };

    let settings = args.apply(SimulationSettings { steps: 20, ..SimulationSettings::default() });
    assert_eq!(settings.paths, 50);
    assert_eq!(settings.steps, 20);
    assert_eq!(settings.returns, gbmsim_core::ReturnKind::Log);
}

#[test]
fn mu_without_sigma_is_rejected() {
    assert!(Cli::try_parse_from(["gbmsim", "simulate", "--mu", "0.001"]).is_err());
    assert!(Cli::try_parse_from([
        "gbmsim", "simulate", "--input", "a.csv", "--mu", "0.1", "--sigma", "0.2"
    ])
    .is_err());
}

#[tokio::test]
async fn simulate_command_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("prices.csv");
    let mut file = File::create(&input).unwrap();
    writeln!(file, "Date,Close").unwrap();
    for (i, price) in ["180.0", "182.5", "181.0", "null", "184.2", "186.0"].iter().enumerate() {
        writeln!(file, "2024-01-{:02},{}", i + 1, price).unwrap();
    }
    drop(file);

    let out = dir.path().join("run.parquet");
    let trace_out = dir.path().join("trace.csv");
    let cli = Cli::try_parse_from([
        "gbmsim",
        "simulate",
        "--input",
        input.to_str().unwrap(),
        "--paths",
        "8",
        "--steps",
        "30",
        "--parallel",
        "--out",
        out.to_str().unwrap(),
        "--trace-out",
        trace_out.to_str().unwrap(),
    ])
    .unwrap();
    let Commands::Simulate(args) = cli.command else {
        panic!("expected simulate");
    };

    run_simulate_command(args).await.unwrap();

    let manifest = RunManifest::load_from_file(&dir.path().join("run.manifest.json")).unwrap();
    assert_eq!(manifest.n_paths, 8);
    assert_relative_eq!(manifest.initial_price, 186.0);
    assert_eq!(manifest.n_returns, 4);
    assert!(manifest.parallel);

    let trace_rows = csv::Reader::from_path(&trace_out).unwrap().records().count();
    assert_eq!(trace_rows, 31);
}
