//! # Mock Data
//!
//! Loads the read-only simulation data (SKUs, locations, orders, tasks, task collections) and any
//! starting employees or root causes into the document store.
//!
//! ## File Format
//!
//! One JSON object, keys are collection names, values are arrays of documents.
//! ```json
//! {
//!     "skus": [{ "_id": "s1", "no": "SKU-0001", "zone": "A", "name": "bolt", "price": 0.25 }],
//!     "locations": [{ "_id": "l1", "storedItems": [{ "sku": "s1", "quantity": 40 }] }]
//! }
//! ```
//!
//! ## Notes
//! - Documents keep their `_id` so references between collections survive
//! - Plain text employee passwords are hashed before they are stored
//! - Existing ids are skipped, running the seed twice is harmless
//! - Exception logs keep their `no`, the counter of each category is raised past the highest one loaded
//! - Root cause titles are reserved like titles created through the API
use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use server::{
    auth::hash_password,
    counter::{CounterStore, LogCategory},
    documents::{Collection, Document, DocumentError, DocumentStore, document_id},
    log_number::parse_log_number,
    models::check_document,
};

const HASH_PREFIX: &str = "$argon2";

pub struct Seed {
    pub documents: Vec<(Collection, Document)>,
}

pub fn read_seed(path: &Path) -> Result<Seed> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    parse_seed(&raw)
}

pub fn parse_seed(raw: &str) -> Result<Seed> {
    let Value::Object(root) = serde_json::from_str(raw).context("seed file is not valid JSON")? else {
        bail!("seed file must be a JSON object keyed by collection");
    };

    let mut documents = Vec::new();
    for (name, entries) in root {
        let collection: Collection = name.parse().map_err(|e: String| anyhow!(e))?;
        let Value::Array(entries) = entries else {
            bail!("{name} must be an array of documents");
        };

        for (index, entry) in entries.into_iter().enumerate() {
            let Value::Object(document) = entry else {
                bail!("{name}[{index}] is not an object");
            };
            check_document(collection, &document).map_err(|e| anyhow!("{name}[{index}]: {e}"))?;
            documents.push((collection, document));
        }
    }

    Ok(Seed { documents })
}

fn hash_plain_password(document: &mut Document) -> Result<()> {
    let Some(Value::String(password)) = document.get("password") else {
        return Ok(());
    };
    if password.starts_with(HASH_PREFIX) {
        return Ok(());
    }

    let hash = hash_password(password).map_err(|e| anyhow!("{e}"))?;
    document.insert("password".to_string(), Value::String(hash));

    Ok(())
}

/// Highest sequence value per category among the seeded exception logs.
fn highest_issued(documents: &[(Collection, Document)]) -> BTreeMap<LogCategory, u64> {
    let mut highest = BTreeMap::new();

    for (_, document) in documents
        .iter()
        .filter(|(collection, _)| *collection == Collection::Exceptions)
    {
        if let Some((category, value)) = document
            .get("no")
            .and_then(Value::as_str)
            .and_then(parse_log_number)
        {
            let entry = highest.entry(category).or_insert(0);
            *entry = value.max(*entry);
        }
    }

    highest
}

pub struct Report {
    pub inserted: usize,
    pub skipped: usize,
    pub counters: Vec<(LogCategory, u64)>,
}

pub async fn load_seed(
    store: &dyn DocumentStore,
    counters: &dyn CounterStore,
    seed: Seed,
) -> Result<Report> {
    let highest = highest_issued(&seed.documents);

    let pb = ProgressBar::new(seed.documents.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut report = Report {
        inserted: 0,
        skipped: 0,
        counters: Vec::new(),
    };

    for (collection, mut document) in seed.documents {
        pb.set_message(format!("Loading {collection}"));

        if collection == Collection::Employees {
            hash_plain_password(&mut document)?;
        }

        match store.insert(collection, document).await {
            Ok(inserted) => {
                if collection == Collection::RootCauses {
                    reserve_title(store, &inserted, &pb).await?;
                }
                report.inserted += 1;
            }
            Err(DocumentError::DuplicateId(id)) => {
                pb.println(format!("Skipping existing {collection} {id}"));
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    for (category, floor) in highest {
        let value = counters.raise_to(category, floor).await?;
        report.counters.push((category, value));
    }

    Ok(report)
}

async fn reserve_title(
    store: &dyn DocumentStore,
    root_cause: &Document,
    pb: &ProgressBar,
) -> Result<()> {
    let (Some(id), Some(title)) = (
        document_id(root_cause),
        root_cause.get("title").and_then(Value::as_str),
    ) else {
        return Ok(());
    };

    if !store
        .claim_unique(Collection::RootCauses, "title", title, id)
        .await?
    {
        pb.println(format!("Root cause title {title} is already taken"));
    }

    Ok(())
}
