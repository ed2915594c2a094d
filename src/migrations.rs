//! Versioned schema migrations.
//!
//! Each migration runs exactly once, tracked by the `schema_version`
//! collection, and is safe to re-run: index creation is idempotent and
//! backfills only touch documents where the field is missing or null. Runs at startup,
//! never per request.

use log::{debug, info};
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Serialize, Deserialize)]
struct SchemaVersion {
    version: i32,
    description: String,
    applied_at: BsonDateTime,
}

enum Step {
    UniqueIndex {
        collection: &'static str,
        field: &'static str,
    },
    /// Sets `field` to `default` on documents that predate it or hold null.
    Backfill {
        collection: &'static str,
        field: &'static str,
        default: &'static str,
    },
    Index {
        collection: &'static str,
        fields: &'static [&'static str],
    },
}

struct Migration {
    version: i32,
    description: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "unique usernames",
        step: Step::UniqueIndex {
            collection: "users",
            field: "username",
        },
    },
    Migration {
        version: 2,
        description: "backfill task priority",
        step: Step::Backfill {
            collection: "tasks",
            field: "priority",
            default: "Medium",
        },
    },
    Migration {
        version: 3,
        description: "backfill task due time",
        step: Step::Backfill {
            collection: "tasks",
            field: "due_time",
            default: "23:59",
        },
    },
    Migration {
        version: 4,
        description: "index tasks by owner and deadline",
        step: Step::Index {
            collection: "tasks",
            fields: &["user_id", "due_date", "due_time"],
        },
    },
];

fn pending(current: i32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > current)
}

/// Highest applied version, or 0 for a fresh database.
async fn current_version(versions: &Collection<SchemaVersion>) -> Result<i32, StoreError> {
    let latest = versions
        .find_one(doc! {})
        .sort(doc! { "version": -1 })
        .await?;
    Ok(latest.map(|v| v.version).unwrap_or(0))
}

/// Matches both null and absent values.
fn unset_filter(field: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(field, Bson::Null);
    filter
}

async fn apply(db: &Database, step: &Step) -> Result<(), StoreError> {
    match step {
        Step::UniqueIndex { collection, field } => {
            let mut keys = Document::new();
            keys.insert(*field, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            db.collection::<Document>(collection).create_index(model).await?;
        }
        Step::Backfill {
            collection,
            field,
            default,
        } => {
            let filter = unset_filter(field);
            let mut set = Document::new();
            set.insert(*field, *default);
            let res = db
                .collection::<Document>(collection)
                .update_many(filter, doc! { "$set": set })
                .await?;
            info!(
                "Backfilled {}.{} on {} document(s)",
                collection, field, res.modified_count
            );
        }
        Step::Index { collection, fields } => {
            let mut keys = Document::new();
            for field in fields.iter() {
                keys.insert(*field, 1);
            }
            let model = IndexModel::builder().keys(keys).build();
            db.collection::<Document>(collection).create_index(model).await?;
        }
    }
    Ok(())
}

/// Applies every pending migration in order. Returns how many ran.
pub async fn run(db: &Database) -> Result<usize, StoreError> {
    let versions = db.collection::<SchemaVersion>("schema_version");
    let current = current_version(&versions).await?;

    let mut applied = 0;
    for migration in pending(current) {
        apply(db, &migration.step).await?;
        versions
            .insert_one(SchemaVersion {
                version: migration.version,
                description: migration.description.to_string(),
                applied_at: BsonDateTime::now(),
            })
            .await?;
        info!(
            "Applied migration v{}: {}",
            migration.version, migration.description
        );
        applied += 1;
    }

    if applied == 0 {
        debug!("Schema up to date at v{}", current);
    }
    Ok(applied)
}
