use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use filedate_offset_core::{walk, DateOffset, FilterMode, LogEntry, NameFilter, RunConfig, RunMode};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "filedate-offset-cli")]
#[command(about = "フォルダ内ファイルの日時と撮影日時をまとめてずらします")]
struct Cli {
    /// -v: info, -vv: debug, -vvv: trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Filters,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// 対象フォルダ (省略時はカレントディレクトリ)
    path: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = FilterArg::All)]
    filter: FilterArg,
    /// `|` 区切りの部分一致パターン (--filter custom 用)
    #[arg(long, default_value = "")]
    custom: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    years: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    months: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    days: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    hours: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    minutes: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    seconds: String,
    /// 6項目をオフセットではなく設定する日時として扱う
    #[arg(long, default_value_t = false)]
    set_date: bool,
    /// 現在のUTC日時を設定する (--set-date を含む)
    #[arg(long, default_value_t = false)]
    now: bool,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    DscMov,
    ImgVid,
    DscMovImgVid,
    Custom,
}

impl From<FilterArg> for FilterMode {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => FilterMode::All,
            FilterArg::DscMov => FilterMode::DscMov,
            FilterArg::ImgVid => FilterMode::ImgVid,
            FilterArg::DscMovImgVid => FilterMode::DscMovImgVid,
            FilterArg::Custom => FilterMode::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Default)]
struct Summary {
    unchanged: usize,
    changed: usize,
    errors: usize,
    missing: usize,
}

impl Summary {
    fn record(&mut self, entry: &LogEntry) {
        match entry {
            LogEntry::Unchanged { .. } => self.unchanged += 1,
            LogEntry::ApplyOffset { .. } | LogEntry::SetDate { .. } => self.changed += 1,
            LogEntry::Failed { .. } => self.errors += 1,
            LogEntry::FileMissing { .. } => self.missing += 1,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Filters => cmd_filters(),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let root = match args.path.clone() {
        Some(path) => path,
        None => env::current_dir().context("カレントディレクトリを取得できませんでした")?,
    };
    let config = build_config(root, &args);
    let apply = config.is_apply();
    let walk = walk(config)?;
    if let OutputFormat::Json = args.output {
        println!("{}", config_line(walk.config())?);
    }

    let mut summary = Summary::default();
    for entry in walk {
        summary.record(&entry);
        match args.output {
            OutputFormat::Table => println!("{entry}"),
            OutputFormat::Json => println!("{}", serde_json::to_string(&entry)?),
        }
        if let LogEntry::FileMissing { .. } = entry {
            eprintln!("!!! {entry}");
        }
    }

    eprintln!(
        "\n集計: unchanged={} changed={} errors={} missing={}",
        summary.unchanged, summary.changed, summary.errors, summary.missing
    );
    if !apply {
        eprintln!("dry-runモード: 実ファイルは変更していません。適用するには --apply を指定してください。");
    }
    if summary.missing > 0 {
        anyhow::bail!(
            "{}件のファイルが一時ファイル名のまま残っています。上のログを確認してください。",
            summary.missing
        );
    }
    Ok(())
}

fn build_config(root: PathBuf, args: &RunArgs) -> RunConfig {
    let (offset, absolute) = if args.now {
        (DateOffset::now_utc(), true)
    } else {
        (
            DateOffset::from_text_fields(
                &args.years,
                &args.months,
                &args.days,
                &args.hours,
                &args.minutes,
                &args.seconds,
            ),
            args.set_date,
        )
    };

    RunConfig {
        root,
        run_mode: if args.apply {
            RunMode::Apply
        } else {
            RunMode::DryRun
        },
        filter: NameFilter::new(args.filter.into(), &args.custom),
        offset,
        absolute,
    }
}

/// Header line of JSON output, tagged like the entries that follow it.
fn config_line(config: &RunConfig) -> Result<String> {
    let mut line = serde_json::Map::new();
    line.insert("kind".to_string(), "config".into());
    line.insert("config".to_string(), serde_json::to_value(config)?);
    Ok(serde_json::Value::Object(line).to_string())
}

fn cmd_filters() -> Result<()> {
    for mode in FilterMode::ALL_MODES {
        println!("{:<16} {}", filter_arg_name(mode), mode.label());
    }
    Ok(())
}

fn filter_arg_name(mode: FilterMode) -> &'static str {
    match mode {
        FilterMode::All => "all",
        FilterMode::DscMov => "dsc-mov",
        FilterMode::ImgVid => "img-vid",
        FilterMode::DscMovImgVid => "dsc-mov-img-vid",
        FilterMode::Custom => "custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["filedate-offset-cli", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).expect("parse").command {
            Commands::Run(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn fields_parse_leniently_and_accept_negative_values() {
        let args = run_args(&["/photos", "--days", "-2", "--hours", "abc", "--years=1"]);
        let config = build_config(PathBuf::from("/photos"), &args);
        assert_eq!(config.offset.days, -2);
        assert_eq!(config.offset.hours, 0);
        assert_eq!(config.offset.years, 1);
        assert_eq!(config.run_mode, RunMode::DryRun);
        assert!(!config.absolute);
    }

    #[test]
    fn custom_filter_and_apply_flag_reach_config() {
        let args = run_args(&["--filter", "custom", "--custom", "PXL_|IMG_", "--apply"]);
        assert!(args.path.is_none());
        let config = build_config(PathBuf::from("."), &args);
        assert_eq!(config.filter.mode, FilterMode::Custom);
        assert_eq!(config.filter.patterns, vec!["PXL_", "IMG_"]);
        assert!(config.is_apply());
    }

    #[test]
    fn json_output_starts_with_the_run_config() {
        let args = run_args(&["--filter", "custom", "--custom", "PXL_", "--days", "-1", "--apply"]);
        let config = build_config(PathBuf::from("/photos"), &args);
        let line = config_line(&config).expect("serialize");

        let value: serde_json::Value = serde_json::from_str(&line).expect("json");
        assert_eq!(value["kind"], "config");
        assert_eq!(value["config"]["run_mode"], "apply");
        assert_eq!(value["config"]["filter"]["mode"], "custom");
        assert_eq!(value["config"]["offset"]["days"], -1);
        assert_eq!(value["config"]["absolute"], false);
    }

    #[test]
    fn now_implies_set_date() {
        let args = run_args(&["--now", "--days", "5"]);
        let config = build_config(PathBuf::from("."), &args);
        assert!(config.absolute);
        assert!(config.offset.to_absolute().is_ok());
    }

    #[test]
    fn filter_names_match_clap_values() {
        for mode in FilterMode::ALL_MODES {
            let parsed = FilterArg::from_str(filter_arg_name(mode), false).expect("known name");
            assert_eq!(FilterMode::from(parsed), mode);
        }
    }
}
