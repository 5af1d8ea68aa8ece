use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use workshop_ledger::config::Config;
use workshop_ledger::db::{NOMINAL_CODES, NOMINAL_CODE_RULES, TAX_RATES};
use workshop_ledger::{
    import_documents, load_nominal_codes, load_rules, load_tax_rates, next_document_number,
    setup_database, write_csv, DocumentKind, LineDocument, NominalCode,
    NominalCodeRegistry, NominalCodeRule, NominalExporter, RuleAuditor, RuleEngine, TaxRate,
    TaxRateTable,
};

#[derive(Parser)]
#[command(name = "workshop-ledger")]
#[command(about = "Nominal code assignment and VAT/profit totals for workshop documents")]
struct Cli {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./workshop-ledger.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,

    /// Import a JSON array of records into a collection
    Import {
        #[arg(value_enum)]
        collection: Collection,
        file: PathBuf,
    },

    /// Check rules for problems that leave items unassigned
    Audit,

    /// Assign nominal codes to document lines and write CSV
    Export {
        /// JSON array of documents
        documents: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print per-code totals after exporting
        #[arg(long)]
        summary: bool,
    },

    /// Print VAT breakdown and profit for each document
    Totals { documents: PathBuf },

    /// Print the next document number for an entity
    NextNumber {
        #[arg(value_enum)]
        kind: Kind,
        entity: String,
        documents: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Collection {
    NominalCodes,
    Rules,
    TaxRates,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Estimate,
    Invoice,
    PurchaseOrder,
}

impl From<Kind> for DocumentKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Estimate => DocumentKind::Estimate,
            Kind::Invoice => DocumentKind::Invoice,
            Kind::PurchaseOrder => DocumentKind::PurchaseOrder,
        }
    }
}

/// Reference data loaded from the store
struct Ledger {
    rules: Vec<NominalCodeRule>,
    codes: NominalCodeRegistry,
    tax_rates: TaxRateTable,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;

    match cli.command {
        Command::Init => {
            tracing::info!(path = ?config.database_path, "Database initialized");
        }
        Command::Import { collection, file } => run_import(&conn, collection, &file)?,
        Command::Audit => run_audit(&conn, &config)?,
        Command::Export {
            documents,
            output,
            summary,
        } => run_export(&conn, &config, &documents, output, summary)?,
        Command::Totals { documents } => run_totals(&conn, &config, &documents)?,
        Command::NextNumber {
            kind,
            entity,
            documents,
        } => {
            let kind = DocumentKind::from(kind);
            let existing: Vec<String> = LineDocument::load_json(&documents)?
                .into_iter()
                .filter(|d| d.kind == kind && d.entity_id == entity)
                .map(|d| d.number)
                .collect();
            println!("{}", next_document_number(kind, &existing)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {:?}", file))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", file))
}

/// Each file is imported in one transaction; a bad record leaves the store untouched
fn run_import(conn: &Connection, collection: Collection, file: &Path) -> Result<()> {
    let (total, written) = match collection {
        Collection::NominalCodes => {
            let codes: Vec<NominalCode> = read_json(file)?;
            let written = import_documents(conn, NOMINAL_CODES, &codes, |c| c.id.as_str())?;
            (codes.len(), written)
        }
        Collection::Rules => {
            let rules: Vec<NominalCodeRule> = read_json(file)?;
            let written = import_documents(conn, NOMINAL_CODE_RULES, &rules, |r| r.id.as_str())?;
            (rules.len(), written)
        }
        Collection::TaxRates => {
            let rates: Vec<TaxRate> = read_json(file)?;
            let written = import_documents(conn, TAX_RATES, &rates, |r| r.id.as_str())?;
            (rates.len(), written)
        }
    };

    tracing::info!(total, written, unchanged = total - written, "Import complete");
    Ok(())
}

fn load_ledger(conn: &Connection, config: &Config) -> Result<Ledger> {
    let rules = load_rules(conn)?;
    let codes = NominalCodeRegistry::from_codes(load_nominal_codes(conn)?);
    let mut tax_rates = TaxRateTable::from_rates(load_tax_rates(conn)?);

    if let Some(standard_id) = &config.standard_tax_rate_id {
        if !tax_rates.set_standard(standard_id) {
            tracing::warn!(%standard_id, "Configured standard tax rate not found; keeping stored flag");
        }
    }
    if tax_rates.standard().is_none() {
        tracing::warn!("No standard tax rate configured; lines without a tax code carry no VAT");
    }

    tracing::debug!(
        rules = rules.len(),
        codes = codes.count(),
        tax_rates = tax_rates.count(),
        "Reference data loaded"
    );

    Ok(Ledger {
        rules,
        codes,
        tax_rates,
    })
}

fn run_audit(conn: &Connection, config: &Config) -> Result<()> {
    let ledger = load_ledger(conn, config)?;
    let report = RuleAuditor::new(&ledger.codes).audit(&ledger.rules);

    for issue in &report.issues {
        println!(
            "[{:?}] rule {} ({}): {}\n    → {}",
            issue.severity, issue.rule_id, issue.field, issue.issue, issue.recommendation
        );
    }
    println!("{}", report.summary());

    if report.has_critical_issues() {
        bail!("Rule audit found critical issues");
    }
    Ok(())
}

fn run_export(
    conn: &Connection,
    config: &Config,
    documents: &Path,
    output: Option<PathBuf>,
    summary: bool,
) -> Result<()> {
    let ledger = load_ledger(conn, config)?;
    let engine = RuleEngine::from_rules(ledger.rules);
    if engine.skipped_count() > 0 {
        tracing::warn!(skipped = engine.skipped_count(), "Malformed rules ignored; run `audit`");
    }

    let documents = LineDocument::load_json(documents)?;
    let exporter = NominalExporter::new(&engine, &ledger.codes, &ledger.tax_rates)
        .with_unassigned_label(&config.unassigned_label);
    let rows = exporter.export(&documents);

    match &output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
            write_csv(&rows, file)?;
            tracing::info!(rows = rows.len(), path = ?path, "Export written");
        }
        None => write_csv(&rows, io::stdout().lock())?,
    }

    if summary {
        for line in exporter.summarize(&rows) {
            eprintln!(
                "{:<12} {:<30} {:>4} lines  net £{:>10.2}  VAT £{:>9.2}",
                line.nominal_code, line.nominal_name, line.line_count, line.net, line.vat
            );
        }
    }

    Ok(())
}

fn run_totals(conn: &Connection, config: &Config, documents: &Path) -> Result<()> {
    let ledger = load_ledger(conn, config)?;

    for document in LineDocument::load_json(documents)? {
        let totals = document.totals(&ledger.tax_rates);
        println!("{} ({}): {}", document.number, document.kind.as_str(), totals.summary());
        for vat in &totals.vat_breakdown {
            println!(
                "    {:<20} {:>5.1}%  net £{:>10.2}  VAT £{:>9.2}",
                vat.name, vat.rate, vat.net, vat.vat
            );
        }
    }

    Ok(())
}
