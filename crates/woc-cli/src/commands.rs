use std::io::{self, BufRead, Write};

use anyhow::{bail, Context};
use colored::Colorize;
use woc_profile::{scan, Profile, ScanOptions};
use woc_query::{
    Content, ErrorKind, OnBad, OnLarge, QueryOptions, Value, VersionFilter, WocError, WocMaps,
};

use crate::cli::*;
use crate::format::{commit_line, is_raw_layout, raw_commit_line, tag_line, tree_lines};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let result = match cli.command {
        Command::Detect(args) => cmd_detect(args),
        Command::Verify(args) => cmd_verify(args),
        Command::GetValues(args) => cmd_get_values(args, format),
        Command::ShowContent(args) => cmd_show_content(args, format),
        Command::Count(args) => cmd_count(args, format),
        Command::AllKeys(args) => cmd_all_keys(args),
    };
    match result {
        Err(e) if is_broken_pipe(&e) => Ok(()),
        other => other,
    }
}

fn is_broken_pipe(e: &anyhow::Error) -> bool {
    e.chain()
        .filter_map(|c| c.downcast_ref::<io::Error>())
        .any(|io| io.kind() == io::ErrorKind::BrokenPipe)
}

fn query_options(args: &QueryArgs) -> QueryOptions {
    let mut opts = QueryOptions::new();
    match args.map_version.as_slice() {
        [] => {}
        [one] => opts = opts.version(VersionFilter::One(one.clone())),
        many => opts = opts.version(VersionFilter::AnyOf(many.to_vec())),
    }
    if args.ignore_large {
        opts = opts.on_large(OnLarge::Ignore);
    }
    if args.strict {
        opts = opts.on_bad(OnBad::Error);
    }
    opts
}

fn open_maps(args: &QueryArgs) -> anyhow::Result<WocMaps> {
    let maps = WocMaps::open(args.profile.profile.as_deref(), query_options(args))
        .context("failed to open profile")?;
    Ok(maps)
}

/// Non-empty trimmed lines of stdin.
fn stdin_keys() -> impl Iterator<Item = io::Result<String>> {
    io::stdin().lock().lines().filter_map(|line| match line {
        Ok(l) => {
            let key = l.trim();
            (!key.is_empty()).then(|| key.to_string()).map(Ok)
        }
        Err(e) => Some(Err(e)),
    })
}

/// Log a per-key failure, or return it when it concerns the whole run.
fn report(key: &str, e: WocError) -> anyhow::Result<()> {
    match e.kind() {
        ErrorKind::Configuration => Err(e.into()),
        ErrorKind::NotFound => {
            tracing::warn!(key, "{e}");
            Ok(())
        }
        ErrorKind::Decode | ErrorKind::StorageIo => {
            tracing::error!(key, "{e}");
            Ok(())
        }
    }
}

fn cmd_detect(args: DetectArgs) -> anyhow::Result<()> {
    let mut opts = ScanOptions::new()
        .strict(!args.no_skip_missing)
        .with_digest(args.with_digest);
    if let Some(v) = args.map_version {
        opts = opts.version(v);
    }
    if let Some(p) = args.preset {
        opts = opts.preset(p);
    }
    let profile = scan(&args.paths, &opts)?;
    match args.output {
        Some(path) => {
            profile.save(&path)?;
            eprintln!("{} Wrote profile to {}", "✓".green().bold(), path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            writeln!(out, "{}", profile.to_json()?)?;
        }
    }
    Ok(())
}

fn cmd_verify(args: ProfileArgs) -> anyhow::Result<()> {
    let profile = match args.profile {
        Some(path) => Profile::load(path)?,
        None => Profile::discover()?,
    };
    let failures = profile.verify();
    let total = profile.files().count();
    if failures.is_empty() {
        println!("{} {} files verified", "✓".green().bold(), total);
        return Ok(());
    }
    for f in &failures {
        println!("  {} {}: {}", "✗".red(), f.path.display(), f.reason);
    }
    bail!("{} of {} files failed verification", failures.len(), total)
}

fn cmd_get_values(args: GetValuesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let maps = open_maps(&args.query)?;
    let mut out = io::stdout().lock();
    for key in stdin_keys() {
        let key = key?;
        let values = match maps.iter_values(&args.name, key.as_str()) {
            Ok(values) => values,
            Err(e) => {
                report(&key, e)?;
                continue;
            }
        };
        match format {
            OutputFormat::Text => {
                write!(out, "{key}")?;
                for value in values {
                    match value {
                        Ok(v) => {
                            for field in v.into_fields() {
                                write!(out, ";{field}")?;
                            }
                        }
                        Err(e) => {
                            report(&key, e)?;
                            break;
                        }
                    }
                }
                writeln!(out)?;
            }
            OutputFormat::Json => {
                let collected: Result<Vec<Value>, WocError> = values.collect();
                match collected {
                    Ok(vs) => {
                        let json = serde_json::json!({ "key": key, "values": vs });
                        writeln!(out, "{json}")?;
                    }
                    Err(e) => report(&key, e)?,
                }
            }
        }
    }
    Ok(())
}

fn cmd_show_content(args: ShowContentArgs, format: OutputFormat) -> anyhow::Result<()> {
    let maps = open_maps(&args.query)?;
    let mut out = io::stdout().lock();
    let raw_commits =
        args.kind == "commit" && format == OutputFormat::Text && is_raw_layout(args.layout);
    for key in stdin_keys() {
        let key = key?;
        if raw_commits {
            match maps.raw_object(&args.kind, key.as_str()) {
                Ok(raw) => {
                    out.write_all(&raw_commit_line(&key, &raw, args.layout)?)?;
                    writeln!(out)?;
                }
                Err(e) => report(&key, e)?,
            }
            continue;
        }
        let content = match maps.show_content(&args.kind, key.as_str()) {
            Ok(c) => c,
            Err(e) => {
                report(&key, e)?;
                continue;
            }
        };
        if format == OutputFormat::Json {
            let json = serde_json::json!({ "key": key, "content": content });
            writeln!(out, "{json}")?;
            continue;
        }
        match content {
            Content::Commit(c) => writeln!(out, "{}", commit_line(&key, &c, args.layout)?)?,
            Content::Tree { entries } => out.write_all(tree_lines(&entries).as_bytes())?,
            Content::Blob { data } => out.write_all(&data)?,
            Content::Tag(t) => writeln!(out, "{}", tag_line(&key, &t))?,
        }
    }
    Ok(())
}

fn cmd_count(args: NameArgs, format: OutputFormat) -> anyhow::Result<()> {
    let maps = open_maps(&args.query)?;
    let n = maps.count(&args.name)?;
    match format {
        OutputFormat::Text => println!("{n}"),
        OutputFormat::Json => println!("{}", serde_json::json!({ "name": args.name, "count": n })),
    }
    Ok(())
}

fn cmd_all_keys(args: NameArgs) -> anyhow::Result<()> {
    let maps = open_maps(&args.query)?;
    let mut out = io::stdout().lock();
    let mut failed = 0usize;
    for key in maps.all_keys(&args.name)? {
        match key {
            Ok(k) => writeln!(out, "{k}")?,
            Err(e) => {
                tracing::error!(name = %args.name, "{e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} keys could not be read");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn query(argv: &[&str]) -> QueryArgs {
        let cli = Cli::parse_from(argv);
        match cli.command {
            Command::GetValues(a) => a.query,
            _ => panic!("expected get-values"),
        }
    }

    #[test]
    fn options_from_flags() {
        let opts = query_options(&query(&["woc", "get-values", "c2p"]));
        assert!(opts.version.is_none());
        assert_eq!(opts.on_large, OnLarge::Include);
        assert_eq!(opts.on_bad, OnBad::Ignore);

        let opts = query_options(&query(&[
            "woc", "get-values", "c2p", "--map-version", "U", "--ignore-large", "--strict",
        ]));
        assert_eq!(opts.version, Some(VersionFilter::One("U".into())));
        assert_eq!(opts.on_large, OnLarge::Ignore);
        assert_eq!(opts.on_bad, OnBad::Error);
    }

    #[test]
    fn repeated_versions_become_a_set() {
        let opts = query_options(&query(&[
            "woc", "get-values", "c2p", "--map-version", "U", "--map-version", "T",
        ]));
        assert_eq!(
            opts.version,
            Some(VersionFilter::AnyOf(vec!["U".into(), "T".into()]))
        );
    }

    #[test]
    fn show_content_layout_defaults_to_zero() {
        let cli = Cli::parse_from(["woc", "show-content", "commit"]);
        match cli.command {
            Command::ShowContent(a) => assert_eq!(a.layout, 0),
            _ => panic!("expected show-content"),
        }
    }

    #[test]
    fn broken_pipe_is_detected_through_context() {
        let e = anyhow::Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).context("write");
        assert!(is_broken_pipe(&e));
        assert!(!is_broken_pipe(&anyhow::anyhow!("other")));
    }

    #[test]
    fn configuration_errors_abort_the_run() {
        assert!(report("k", WocError::UnknownName("x2y".into())).is_err());
        assert!(report(
            "k",
            WocError::NotFound {
                name: "c2p".into(),
                key: "k".into()
            }
        )
        .is_ok());
    }
}
