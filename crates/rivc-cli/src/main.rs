// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! rivc: inspect, extract, convert, and diff Rive container files.
#![allow(clippy::print_stdout, clippy::print_stderr)] // a CLI's reports and diagnostics are its output

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use rivc_core::chunk::ChunkKind;
use rivc_core::container::{self, RivFile};
use rivc_core::diff::{self, GrowthVerdict};
use rivc_core::error::{DecodeError, EncodeError, ErrorKind};
use rivc_core::json::{self, UniversalFile};
use rivc_core::schema::{PropertyKey, SchemaCatalog, TypeKey};
use rivc_core::validate;
use rivc_core::Context;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "rivc",
    about = "Inspect and convert Rive container files",
    disable_help_subcommand = true
)]
struct Cli {
    /// Emit debug-level diagnostics to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a container into the universal JSON projection.
    Extract {
        input: PathBuf,
        output: PathBuf,
        /// Track exact byte-level artifacts and set `__riv_exact__`.
        #[arg(long)]
        exact: bool,
        /// Pretty-print with two-space indentation.
        #[arg(long)]
        pretty: bool,
    },
    /// Encode a universal JSON document back into a container.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Require `__riv_exact__` fidelity in the source document.
        #[arg(long)]
        exact: bool,
    },
    /// Print a container's header, chunk map, and object-type histogram.
    Analyze {
        input: PathBuf,
        /// Emit the report as JSON instead of tables.
        #[arg(long)]
        json: bool,
        /// Escalate validator warnings to failures.
        #[arg(long)]
        strict: bool,
        /// Print the compiled-in property/type catalog instead of the file.
        #[arg(long)]
        dump_catalog: bool,
    },
    /// Compare two containers structurally and report size growth.
    Diff {
        reference: PathBuf,
        candidate: PathBuf,
        /// Emit the report as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Extract {
            input,
            output,
            exact,
            pretty,
        } => run_extract(&input, &output, exact, pretty),
        Commands::Convert {
            input,
            output,
            exact,
        } => run_convert(&input, &output, exact),
        Commands::Analyze {
            input,
            json,
            strict,
            dump_catalog,
        } => run_analyze(&input, json, strict, dump_catalog),
        Commands::Diff {
            reference,
            candidate,
            json,
        } => run_diff(&reference, &candidate, json),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber was already installed");
    }
}

fn read_container(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read container {}", path.display()))
}

/// Single-line stderr diagnostic per the format's error-reporting contract:
/// kind, byte offset (when known), and the enclosing record's type key.
fn diagnostic_line(
    kind: ErrorKind,
    offset: Option<u64>,
    type_key: Option<u32>,
    message: &str,
) -> String {
    let mut line = format!("error: {kind:?}: {message}");
    if let Some(offset) = offset {
        let _ = write!(line, " (offset {offset})");
    }
    if let Some(type_key) = type_key {
        let _ = write!(line, " (type key {type_key})");
    }
    line
}

fn diagnostic_json(
    kind: ErrorKind,
    offset: Option<u64>,
    type_key: Option<u32>,
    message: &str,
) -> serde_json::Value {
    serde_json::json!({
        "ok": false,
        "kind": format!("{kind:?}"),
        "offset": offset,
        "typeKey": type_key,
        "message": message,
    })
}

fn report_decode_error(err: &DecodeError, json: bool) -> ExitCode {
    let (kind, offset, type_key) = (err.kind(), err.offset(), err.type_key());
    if json {
        println!(
            "{}",
            diagnostic_json(kind, offset, type_key, &err.to_string())
        );
    } else {
        eprintln!(
            "{}",
            diagnostic_line(kind, offset, type_key, &err.to_string())
        );
    }
    ExitCode::from(2)
}

fn report_encode_error(err: &EncodeError, json: bool) -> ExitCode {
    let kind = err.kind();
    let offset = if let EncodeError::Bitstream(b) = err {
        Some(b.offset())
    } else {
        None
    };
    if json {
        println!("{}", diagnostic_json(kind, offset, None, &err.to_string()));
    } else {
        eprintln!("{}", diagnostic_line(kind, offset, None, &err.to_string()));
    }
    ExitCode::from(2)
}

fn run_extract(input: &Path, output: &Path, exact: bool, pretty: bool) -> Result<ExitCode> {
    let bytes = read_container(input)?;
    let ctx = Context { strict: false };

    let file = if exact {
        match container::decode_exact(&bytes, &ctx) {
            Ok((file, _meta)) => file,
            Err(err) => return Ok(report_decode_error(&err, false)),
        }
    } else {
        match container::decode(&bytes, &ctx) {
            Ok(file) => file,
            Err(err) => return Ok(report_decode_error(&err, false)),
        }
    };

    let universal = json::lift(&file.header, &file.graph, &file.chunks, exact);
    let text = if pretty {
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut buf,
            serde_json::ser::PrettyFormatter::with_indent(b"  "),
        );
        serde::Serialize::serialize(&universal, &mut serializer)
            .context("failed to serialize universal JSON")?;
        String::from_utf8(buf).context("serialized JSON was not valid UTF-8")?
    } else {
        serde_json::to_string(&universal).context("failed to serialize universal JSON")?
    };

    fs::write(output, text).with_context(|| format!("failed to write {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn run_convert(input: &Path, output: &Path, exact: bool) -> Result<ExitCode> {
    let text =
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let mut universal: UniversalFile = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {} as universal JSON", input.display()))?;
    if exact {
        universal.exact = Some(true);
    }

    let records = match json::lower(&universal) {
        Ok(records) => records,
        Err(err) => return Ok(report_encode_error(&err, false)),
    };

    let Some(header_meta) = universal.header.as_ref() else {
        bail!("convert requires a \"header\" block (file id and property keys)");
    };
    let (major, minor) = header_meta
        .version
        .split_once('.')
        .context("header.version must be \"major.minor\"")?;
    let major: u64 = major
        .parse()
        .context("header.version major component is not a number")?;
    let minor: u64 = minor
        .parse()
        .context("header.version minor component is not a number")?;
    let properties = header_meta
        .property_keys
        .iter()
        .map(|&key| (key, SchemaCatalog::resolve(PropertyKey(key), None).0))
        .collect();
    let header = rivc_core::header::Header::new(major, minor, header_meta.file_id, properties);

    let graph = rivc_core::graph::GraphModel::from_records(records);
    let file = RivFile {
        header,
        graph,
        chunks: Vec::new(),
        trailer: Vec::new(),
    };

    let bytes = match container::encode(&file) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(report_encode_error(&err, false)),
    };

    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn run_analyze(
    input: &Path,
    json_mode: bool,
    strict: bool,
    dump_catalog: bool,
) -> Result<ExitCode> {
    if dump_catalog {
        return Ok(print_catalog(json_mode));
    }

    let bytes = read_container(input)?;
    let ctx = Context { strict };
    let file = match container::decode(&bytes, &ctx) {
        Ok(file) => file,
        Err(err) => return Ok(report_decode_error(&err, json_mode)),
    };
    let report = validate::validate(&file.header, &file.graph, &file.chunks);
    let passed = report.ok(&ctx);

    if json_mode {
        println!("{}", analysis_json(&file, &report));
    } else {
        print_analysis(&file, &report);
    }

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_catalog(json_mode: bool) -> ExitCode {
    if json_mode {
        let properties: Vec<_> = SchemaCatalog::properties()
            .map(|(key, name, ty)| serde_json::json!({ "key": key, "name": name, "type": format!("{ty:?}") }))
            .collect();
        let types: Vec<_> = SchemaCatalog::types()
            .map(|(key, name)| serde_json::json!({ "key": key, "name": name }))
            .collect();
        println!(
            "{}",
            serde_json::json!({ "properties": properties, "types": types })
        );
    } else {
        let mut properties = Table::new();
        properties.set_header(vec!["key", "name", "type"]);
        for (key, name, ty) in SchemaCatalog::properties() {
            properties.add_row(vec![key.to_string(), name.to_owned(), format!("{ty:?}")]);
        }
        println!("{properties}");

        let mut types = Table::new();
        types.set_header(vec!["key", "name"]);
        for (key, name) in SchemaCatalog::types() {
            types.add_row(vec![key.to_string(), name.to_owned()]);
        }
        println!("{types}");
    }
    ExitCode::SUCCESS
}

fn print_analysis(file: &RivFile, report: &validate::ValidationReport) {
    println!(
        "header: version {}.{}, file id {}, {} declared propert(y/ies)",
        file.header.major,
        file.header.minor,
        file.header.file_id,
        file.header.property_table.len()
    );

    let mut chunks = Table::new();
    chunks.set_header(vec!["index", "kind", "objects", "terminators"]);
    for (index, chunk) in file.chunks.iter().enumerate() {
        chunks.add_row(vec![
            index.to_string(),
            chunk_kind_name(chunk.kind).to_owned(),
            chunk.records.len().to_string(),
            chunk.terminator_count.to_string(),
        ]);
    }
    println!("{chunks}");

    let mut histogram = Table::new();
    histogram.set_header(vec!["type key", "name", "count"]);
    for (type_key, name, count) in type_histogram(file) {
        histogram.add_row(vec![type_key.to_string(), name, count.to_string()]);
    }
    println!("{histogram}");

    if !report.errors.is_empty() || !report.warnings.is_empty() || !report.info.is_empty() {
        println!(
            "validation: {} error(s), {} warning(s), {} info",
            report.errors.len(),
            report.warnings.len(),
            report.info.len()
        );
        for e in &report.errors {
            println!("  error: {e}");
        }
        for w in &report.warnings {
            println!("  warning: {w}");
        }
        for i in &report.info {
            println!("  info: {}", i.0);
        }
    }
}

fn analysis_json(file: &RivFile, report: &validate::ValidationReport) -> serde_json::Value {
    let chunks: Vec<_> = file
        .chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            serde_json::json!({
                "index": index,
                "kind": chunk_kind_name(chunk.kind),
                "objects": chunk.records.len(),
                "terminators": chunk.terminator_count,
            })
        })
        .collect();
    let histogram: Vec<_> = type_histogram(file)
        .into_iter()
        .map(|(type_key, name, count)| serde_json::json!({ "typeKey": type_key, "name": name, "count": count }))
        .collect();

    serde_json::json!({
        "ok": true,
        "header": {
            "version": format!("{}.{}", file.header.major, file.header.minor),
            "fileId": file.header.file_id,
            "propertyKeys": file.header.property_table,
        },
        "chunks": chunks,
        "objectTypes": histogram,
        "errors": report.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "warnings": report.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "info": report.info.iter().map(|i| i.0.clone()).collect::<Vec<_>>(),
    })
}

fn chunk_kind_name(kind: ChunkKind) -> &'static str {
    match kind {
        ChunkKind::Objects => "objects",
        ChunkKind::AssetPayload => "asset_payload",
        ChunkKind::ArtboardCatalog => "artboard_catalog",
        ChunkKind::Unknown => "unknown",
    }
}

fn type_histogram(file: &RivFile) -> Vec<(u32, String, usize)> {
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for (_, record) in file.graph.records() {
        let type_key = record.type_key.0;
        match counts.iter_mut().find(|(k, _)| *k == type_key) {
            Some((_, n)) => *n += 1,
            None => counts.push((type_key, 1)),
        }
    }
    counts.sort_unstable_by_key(|(k, _)| *k);
    counts
        .into_iter()
        .map(|(key, count)| {
            let name = SchemaCatalog::type_name(TypeKey(key))
                .map_or_else(|| format!("_t{key}"), str::to_owned);
            (key, name, count)
        })
        .collect()
}

fn run_diff(reference: &Path, candidate: &Path, json_mode: bool) -> Result<ExitCode> {
    let reference_bytes = read_container(reference)?;
    let candidate_bytes = read_container(candidate)?;
    let ctx = Context::default();

    let reference_file = match container::decode(&reference_bytes, &ctx) {
        Ok(file) => file,
        Err(err) => return Ok(report_decode_error(&err, json_mode)),
    };
    let candidate_file = match container::decode(&candidate_bytes, &ctx) {
        Ok(file) => file,
        Err(err) => return Ok(report_decode_error(&err, json_mode)),
    };

    let report = diff::diff(
        &reference_bytes,
        &reference_file,
        &candidate_bytes,
        &candidate_file,
    );
    let has_structural_diff = report.first_type_mismatch.is_some()
        || report.object_count_delta != 0
        || !report.missing_header_keys.is_empty()
        || !report.extra_header_keys.is_empty();

    if json_mode {
        println!("{}", diff_json(&report));
    } else {
        print_diff(&report);
    }

    let failed = has_structural_diff || !matches!(report.verdict, GrowthVerdict::Pass);
    Ok(if failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_diff(report: &diff::DiffReport) {
    let verdict = match report.verdict {
        GrowthVerdict::Pass => "PASS",
        GrowthVerdict::Warn => "WARN",
        GrowthVerdict::Fail => "FAIL",
    };
    println!(
        "size: {:+} bytes ({:+.2}%) [{verdict}]",
        report.size_delta, report.size_growth_pct
    );
    println!("objects: {:+}", report.object_count_delta);
    if let Some(index) = report.first_type_mismatch {
        println!("type sequence diverges at index {index}");
    }
    if !report.missing_header_keys.is_empty() {
        println!(
            "header keys missing from candidate: {:?}",
            report.missing_header_keys
        );
    }
    if !report.extra_header_keys.is_empty() {
        println!(
            "header keys added in candidate: {:?}",
            report.extra_header_keys
        );
    }

    let mut table = Table::new();
    table.set_header(vec!["index", "reference", "candidate"]);
    for chunk in &report.chunk_diffs {
        table.add_row(vec![
            chunk.index.to_string(),
            describe_chunk_side(chunk.reference_kind, chunk.reference_len),
            describe_chunk_side(chunk.candidate_kind, chunk.candidate_len),
        ]);
    }
    println!("{table}");
}

fn describe_chunk_side(kind: Option<&'static str>, len: Option<usize>) -> String {
    match (kind, len) {
        (Some(kind), Some(len)) => format!("{kind} ({len})"),
        _ => "-".to_owned(),
    }
}

fn diff_json(report: &diff::DiffReport) -> serde_json::Value {
    let verdict = match report.verdict {
        GrowthVerdict::Pass => "pass",
        GrowthVerdict::Warn => "warn",
        GrowthVerdict::Fail => "fail",
    };
    let chunks: Vec<_> = report
        .chunk_diffs
        .iter()
        .map(|c| {
            serde_json::json!({
                "index": c.index,
                "referenceKind": c.reference_kind,
                "candidateKind": c.candidate_kind,
                "referenceLen": c.reference_len,
                "candidateLen": c.candidate_len,
            })
        })
        .collect();
    serde_json::json!({
        "ok": true,
        "sizeDelta": report.size_delta,
        "sizeGrowthPct": report.size_growth_pct,
        "verdict": verdict,
        "objectCountDelta": report.object_count_delta,
        "firstTypeMismatch": report.first_type_mismatch,
        "missingHeaderKeys": report.missing_header_keys,
        "extraHeaderKeys": report.extra_header_keys,
        "chunks": chunks,
    })
}
