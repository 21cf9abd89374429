//! Storage steps.
//!
//! Each step binds a [`Storage`] and a table. Read steps merge query options
//! found in the previous output (`where`, `columns`) over the step's own
//! options. A condition set by [`set_where_from_resource_id`] earlier in the
//! same run is ANDed into every read, update and removal.

use std::sync::Arc;

use mblock_query::{QueryOptions, Storage};
use mblock_types::{Record, ServiceError};
use serde_json::{Value, json};
use tracing::debug;

use super::{RESOURCE_ID_KEY, USER_ID_KEY};
use crate::{Context, Step, executor::json_type};

/// State key holding a run-scoped `where` condition.
pub const WHERE_STATE_KEY: &str = "where";

/// Saves the previous output as a new record.
pub fn create(storage: Arc<dyn Storage>, table: impl Into<String>) -> Step {
    save(storage, table)
}

/// Upserts the previous output by its `id`.
pub fn save(storage: Arc<dyn Storage>, table: impl Into<String>) -> Step {
    let table: Arc<str> = Arc::from(table.into());
    Step::new(move |ctx: Context, output: Value| {
        let storage = Arc::clone(&storage);
        let table = Arc::clone(&table);
        async move {
            let record = into_record(&ctx, output)?;
            let saved = storage.save(&table, record).await?;
            debug!(path = %ctx.path(), table = %table, "saved record");
            Ok::<_, ServiceError>(Value::Object(saved))
        }
    })
}

/// Fetches the first matching record, or `null`.
pub fn read(storage: Arc<dyn Storage>, table: impl Into<String>, options: QueryOptions) -> Step {
    let table: Arc<str> = Arc::from(table.into());
    Step::new(move |ctx: Context, output: Value| {
        let storage = Arc::clone(&storage);
        let table = Arc::clone(&table);
        let options = scoped(&ctx, options.merged_with(&output));
        async move {
            let record = storage.find_one(&table, &options).await?;
            Ok::<_, ServiceError>(record.map_or(Value::Null, Value::Object))
        }
    })
}

/// Fetches every matching record as a list.
pub fn list(storage: Arc<dyn Storage>, table: impl Into<String>, options: QueryOptions) -> Step {
    let table: Arc<str> = Arc::from(table.into());
    Step::new(move |ctx: Context, output: Value| {
        let storage = Arc::clone(&storage);
        let table = Arc::clone(&table);
        let options = scoped(&ctx, options.merged_with(&output));
        async move {
            let records = storage.find_many(&table, &options).await?;
            Ok::<_, ServiceError>(records_value(records))
        }
    })
}

/// Shallow-merges the previous output into every matching record and returns the updated records.
pub fn update(storage: Arc<dyn Storage>, table: impl Into<String>, options: QueryOptions) -> Step {
    let table: Arc<str> = Arc::from(table.into());
    Step::new(move |ctx: Context, output: Value| {
        let storage = Arc::clone(&storage);
        let table = Arc::clone(&table);
        let options = scoped(&ctx, options.clone());
        async move {
            let patch = into_record(&ctx, output)?;
            let updated = storage.update(&table, patch, &options).await?;
            debug!(path = %ctx.path(), table = %table, updated = updated.len(), "updated records");
            Ok::<_, ServiceError>(records_value(updated))
        }
    })
}

/// Deletes every matching record and returns the removed ids.
pub fn remove(storage: Arc<dyn Storage>, table: impl Into<String>, options: QueryOptions) -> Step {
    let table: Arc<str> = Arc::from(table.into());
    Step::new(move |ctx: Context, output: Value| {
        let storage = Arc::clone(&storage);
        let table = Arc::clone(&table);
        let options = scoped(&ctx, options.merged_with(&output));
        async move {
            let removed = storage.remove(&table, &options).await?;
            debug!(path = %ctx.path(), table = %table, removed = removed.len(), "removed records");
            Ok::<_, ServiceError>(Value::Array(removed))
        }
    })
}

/// Like [`read`], restricted to records whose `field` equals `meta.userId`.
pub fn read_by_user(storage: Arc<dyn Storage>, table: impl Into<String>, field: impl Into<String>, options: QueryOptions) -> Step {
    let inner = read(storage, table, QueryOptions::default());
    by_user(inner, field.into(), options)
}

/// Like [`list`], restricted to records whose `field` equals `meta.userId`.
pub fn list_by_user(storage: Arc<dyn Storage>, table: impl Into<String>, field: impl Into<String>, options: QueryOptions) -> Step {
    let inner = list(storage, table, QueryOptions::default());
    by_user(inner, field.into(), options)
}

/// Records `{id: meta.resourceId}` as the run's `where` condition and hands the output on.
///
/// Fails 500 `GenericsError` when `meta.resourceId` is absent.
pub fn set_where_from_resource_id() -> Step {
    Step::sync(|ctx, output: Value| {
        let resource_id = ctx
            .meta()
            .get(RESOURCE_ID_KEY)
            .filter(|id| !id.is_null())
            .ok_or_else(|| ServiceError::new(500, "GenericsError").with_message("No resourceId field set on meta"))?;
        let condition = json!({ "id": resource_id });
        let condition = match ctx.state().get(WHERE_STATE_KEY) {
            Some(existing) => json!({ "and": [existing, condition] }),
            None => condition,
        };
        ctx.state().insert(WHERE_STATE_KEY, condition);
        Ok(output)
    })
}

/// Wraps a read step so the `where` it receives also pins `field` to the caller.
///
/// The restriction is built from the caller's options merged with the
/// previous output, so a `where` in the output cannot drop it.
fn by_user(inner: Step, field: String, options: QueryOptions) -> Step {
    Step::new(move |ctx: Context, output: Value| {
        let inner = inner.clone();
        let field = field.clone();
        let options = options.merged_with(&output);
        async move {
            let user_id = ctx
                .meta()
                .get(USER_ID_KEY)
                .filter(|id| !id.is_null())
                .cloned()
                .ok_or_else(|| ServiceError::not_logged_in().with_message("Must provide valid credentials"))?;
            let options = options.and_field_equals(&field, user_id);
            let query = serde_json::to_value(&options).map_err(anyhow::Error::from)?;
            inner.invoke(ctx, query).await
        }
    })
}

/// Options with the run-scoped `where` condition ANDed in, when one is set.
fn scoped(ctx: &Context, options: QueryOptions) -> QueryOptions {
    match ctx.state().get(WHERE_STATE_KEY) {
        Some(condition) => options.and_condition(condition),
        None => options,
    }
}

fn into_record(ctx: &Context, output: Value) -> Result<Record, ServiceError> {
    match output {
        Value::Object(record) => Ok(record),
        other => Err(ServiceError::bad_request()
            .with_message(format!("expected a record, found {}", json_type(&other)))
            .with_debug(json!({ "path": ctx.path() }))),
    }
}

fn records_value(records: Vec<Record>) -> Value {
    Value::Array(records.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MethodBlock,
        middleware::testing::{apply, context},
    };
    use mblock_query::MemoryStore;

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::with_tables(["notes"]));
        for note in [
            json!({"id": "n1", "ownerId": "u1", "title": "one"}),
            json!({"id": "n2", "ownerId": "u2", "title": "two"}),
            json!({"id": "n3", "ownerId": "u1", "title": "three"}),
        ] {
            let record = note.as_object().cloned().expect("note object");
            store.save("notes", record).await.expect("seed note");
        }
        store
    }

    fn block() -> MethodBlock {
        MethodBlock::new("notes").step(set_where_from_resource_id())
    }

    #[tokio::test]
    async fn read_merges_options_from_previous_output() {
        let store = seeded().await;
        let step = read(store, "notes", QueryOptions::with_condition(json!({"ownerId": "u1"})));
        let ctx = context(&block(), Value::Null, json!({}));

        let first = apply(&step, &ctx, Value::Null).await.expect("read");
        assert_eq!(first["id"], json!("n1"));

        let overridden = apply(&step, &ctx, json!({"where": {"title": "two"}, "columns": ["title"]})).await.expect("read");
        assert_eq!(overridden, json!({"title": "two"}));
    }

    #[tokio::test]
    async fn resource_id_condition_applies_to_later_steps() {
        let store = seeded().await;
        let ctx = context(&block(), Value::Null, json!({"resourceId": "n3"}));
        apply(&set_where_from_resource_id(), &ctx, Value::Null).await.expect("set where");

        let listed = apply(&list(store.clone(), "notes", QueryOptions::default()), &ctx, Value::Null).await.expect("list");
        assert_eq!(listed, json!([{"id": "n3", "ownerId": "u1", "title": "three"}]));

        let updated = apply(&update(store.clone(), "notes", QueryOptions::default()), &ctx, json!({"title": "3"}))
            .await
            .expect("update");
        assert_eq!(updated, json!([{"id": "n3", "ownerId": "u1", "title": "3"}]));

        let removed = apply(&remove(store.clone(), "notes", QueryOptions::default()), &ctx, Value::Null).await.expect("remove");
        assert_eq!(removed, json!(["n3"]));
        assert_eq!(store.snapshot("notes").await.expect("snapshot").len(), 2);
    }

    #[tokio::test]
    async fn missing_resource_id_is_a_generics_error() {
        let ctx = context(&block(), Value::Null, json!({}));
        let error = apply(&set_where_from_resource_id(), &ctx, Value::Null).await.expect_err("no resource id");
        assert_eq!((error.status, error.kind.as_str()), (Some(500), "GenericsError"));
    }

    #[tokio::test]
    async fn by_user_steps_pin_the_owner_field() {
        let store = seeded().await;
        let ctx = context(&block(), Value::Null, json!({"userId": "u1"}));

        let mine = apply(&list_by_user(store.clone(), "notes", "ownerId", QueryOptions::default()), &ctx, Value::Null)
            .await
            .expect("list mine");
        assert_eq!(mine.as_array().map(Vec::len), Some(2));

        let sneaky = apply(
            &read_by_user(store.clone(), "notes", "ownerId", QueryOptions::default()),
            &ctx,
            json!({"where": {"id": "n2"}}),
        )
        .await
        .expect("read");
        assert_eq!(sneaky, Value::Null, "another user's note stays hidden");

        let anonymous = context(&block(), Value::Null, json!({}));
        let error = apply(&list_by_user(store, "notes", "ownerId", QueryOptions::default()), &anonymous, Value::Null)
            .await
            .expect_err("no user");
        assert_eq!(error.kind, "NotLoggedIn");
    }

    #[tokio::test]
    async fn store_errors_become_service_errors() {
        let store = seeded().await;
        let ctx = context(&block(), Value::Null, json!({}));

        let error = apply(&create(store.clone(), "notes"), &ctx, json!({"title": "no id"})).await.expect_err("missing id");
        assert_eq!(error.status, Some(400));

        let error = apply(&update(store, "notes", QueryOptions::with_condition(json!({"id": "nope"}))), &ctx, json!({"x": 1}))
            .await
            .expect_err("nothing to update");
        assert_eq!(error.status, Some(404));
    }
}
