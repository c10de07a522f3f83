//! Population: reference ids replaced by the referenced documents at read time.
use std::{future::Future, pin::Pin};

use serde_json::Value;

use crate::documents::{Collection, Document, DocumentError, DocumentStore, redact};

#[derive(Debug, Clone, PartialEq)]
pub struct Populate {
    path: &'static str,
    from: Collection,
    nested: Vec<Populate>,
}

impl Populate {
    pub fn path(path: &'static str, from: Collection) -> Self {
        Self {
            path,
            from,
            nested: Vec::new(),
        }
    }

    pub fn with(mut self, nested: Populate) -> Self {
        self.nested.push(nested);
        self
    }
}

pub async fn populate(
    store: &dyn DocumentStore,
    document: &mut Document,
    plans: &[Populate],
) -> Result<(), DocumentError> {
    populate_document(store, document, plans).await
}

pub async fn populate_all(
    store: &dyn DocumentStore,
    documents: &mut [Document],
    plans: &[Populate],
) -> Result<(), DocumentError> {
    for document in documents.iter_mut() {
        populate_document(store, document, plans).await?;
    }
    Ok(())
}

type PopulateFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DocumentError>> + Send + 'a>>;

fn populate_document<'a>(
    store: &'a dyn DocumentStore,
    document: &'a mut Document,
    plans: &'a [Populate],
) -> PopulateFuture<'a> {
    Box::pin(async move {
        for plan in plans {
            let segments: Vec<&str> = plan.path.split('.').collect();
            let mut slots = Vec::new();

            if let Some((head, rest)) = segments.split_first() {
                if let Some(value) = document.get_mut(*head) {
                    slots_at(value, rest, &mut slots);
                }
            }

            for slot in slots {
                resolve(store, slot, plan).await?;
            }
        }
        Ok(())
    })
}

fn slots_at<'a>(value: &'a mut Value, segments: &[&str], slots: &mut Vec<&'a mut Value>) {
    let Some((head, rest)) = segments.split_first() else {
        slots.push(value);
        return;
    };

    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                slots_at(item, segments, slots);
            }
        }
        Value::Object(map) => {
            if let Some(next) = map.get_mut(*head) {
                slots_at(next, rest, slots);
            }
        }
        _ => {}
    }
}

async fn resolve(
    store: &dyn DocumentStore,
    slot: &mut Value,
    plan: &Populate,
) -> Result<(), DocumentError> {
    match slot {
        Value::String(id) => {
            let id = id.clone();
            *slot = fetch(store, &id, plan).await?;
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Value::String(id) = item {
                    let id = id.clone();
                    *item = fetch(store, &id, plan).await?;
                }
            }
        }
        // null or already populated
        _ => {}
    }
    Ok(())
}

async fn fetch(store: &dyn DocumentStore, id: &str, plan: &Populate) -> Result<Value, DocumentError> {
    let Some(mut referenced) = store.find_by_id(plan.from, id).await? else {
        return Ok(Value::Null);
    };

    populate_document(store, &mut referenced, &plan.nested).await?;
    redact(plan.from, &mut referenced);

    Ok(Value::Object(referenced))
}
