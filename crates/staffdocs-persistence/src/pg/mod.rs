//! PostgreSQL document store.
//!
//! Each [`DocumentStore::transaction`] checks a connection out of the r2d2
//! pool and runs the closure inside a read-write diesel transaction. The
//! closure's `Ok` commits; any `Err` (business or database) rolls back.
//! Upload serialisation relies on `SELECT ... FOR UPDATE` in
//! [`StoreTransaction::lock_document`], association idempotence on the
//! unique `(employee_id, document_type_id)` index. Existence checks read
//! with `FOR SHARE`, so a validated employee or type cannot disappear before
//! the dependent write commits.

mod rows;

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::result::Error as DieselError;
use staffdocs::config::DatabaseConfig;
use staffdocs::documents::{
    DocumentFilter, DocumentId, DocumentRecord, DocumentStore, DocumentType, DocumentTypeId,
    DocumentTypeSelection, Employee, EmployeeId, PageRequest, StoreError, StoreTransaction,
};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{document_types, documents, employees};
use rows::{DocumentRow, DocumentTypeRow, EmployeeRow};

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Build a pool and bring the schema up to date on the first checkout.
///
/// A zero bound is treated as one, and `min_size` is clamped to `max_size`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max_size = max_size.max(1);
    let min_size = min_size.max(1);
    if min_size > max_size {
        warn!(min_size, max_size, "pool minimum exceeds maximum, clamping");
    }

    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .min_idle(Some(min_size.min(max_size)))
        .max_size(max_size)
        .build(manager)
        .map_err(|err| PersistenceError::TransientIo(format!("pool build: {err}")))?;

    {
        let mut conn = pool
            .get()
            .map_err(|err| PersistenceError::TransientIo(format!("pool get for migrations: {err}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// [`DocumentStore`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn connect(config: &DatabaseConfig) -> Result<Self, PersistenceError> {
        build_pool(&config.url, config.min_connections, config.max_connections).map(Self::new)
    }
}

/// Why a diesel transaction ended in rollback: the caller's own error, or a
/// failure raised by diesel around it (BEGIN, COMMIT, ROLLBACK).
enum TxFailure<E> {
    Work(E),
    Diesel(DieselError),
}

impl<E> From<DieselError> for TxFailure<E> {
    fn from(err: DieselError) -> Self {
        TxFailure::Diesel(err)
    }
}

impl DocumentStore for PgDocumentStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.pool.get().map_err(|err| {
            E::from(StoreError::from(PersistenceError::TransientIo(format!(
                "pool checkout: {err}"
            ))))
        })?;

        let outcome = conn.build_transaction().read_write().run(|conn| {
            let mut tx = PgTransaction { conn };
            work(&mut tx).map_err(TxFailure::Work)
        });

        match outcome {
            Ok(value) => Ok(value),
            Err(TxFailure::Work(err)) => Err(err),
            Err(TxFailure::Diesel(err)) => {
                debug!(error = %err, "transaction control statement failed");
                Err(E::from(db(err)))
            }
        }
    }
}

fn db(err: DieselError) -> StoreError {
    PersistenceError::from(err).into()
}

/// Listing predicates applied to a fresh boxed query.
fn filtered<'a>(filter: &'a DocumentFilter) -> documents::BoxedQuery<'a, Pg> {
    let mut query = documents::table.into_boxed();
    if let Some(employee_id) = &filter.employee_id {
        query = query.filter(documents::employee_id.eq(employee_id.as_str()));
    }
    if let Some(document_type_id) = &filter.document_type_id {
        query = query.filter(documents::document_type_id.eq(document_type_id.as_str()));
    }
    if let Some(pending) = filter.pending {
        query = query.filter(documents::pending.eq(pending));
    }
    query
}

struct PgTransaction<'c> {
    conn: &'c mut PgConnection,
}

impl StoreTransaction for PgTransaction<'_> {
    fn employee(&mut self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        employees::table
            .find(id.as_str())
            .select(EmployeeRow::as_select())
            .for_share()
            .first(self.conn)
            .optional()
            .map(|row| row.map(Employee::from))
            .map_err(db)
    }

    fn insert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        diesel::insert_into(employees::table)
            .values(EmployeeRow::from(employee))
            .execute(self.conn)
            .map(|_| ())
            .map_err(db)
    }

    fn update_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        let updated = diesel::update(employees::table.find(employee.id.as_str()))
            .set((
                employees::name.eq(employee.name.as_str()),
                employees::hired_at.eq(employee.hired_at),
            ))
            .execute(self.conn)
            .map_err(db)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn document_type(&mut self, id: &DocumentTypeId) -> Result<Option<DocumentType>, StoreError> {
        document_types::table
            .find(id.as_str())
            .select(DocumentTypeRow::as_select())
            .first(self.conn)
            .optional()
            .map(|row| row.map(DocumentType::from))
            .map_err(db)
    }

    fn insert_document_type(&mut self, document_type: &DocumentType) -> Result<(), StoreError> {
        diesel::insert_into(document_types::table)
            .values(DocumentTypeRow::from(document_type))
            .execute(self.conn)
            .map(|_| ())
            .map_err(db)
    }

    fn update_document_type(&mut self, document_type: &DocumentType) -> Result<(), StoreError> {
        let updated = diesel::update(document_types::table.find(document_type.id.as_str()))
            .set(document_types::name.eq(document_type.name.as_str()))
            .execute(self.conn)
            .map_err(db)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete_document_type(&mut self, id: &DocumentTypeId) -> Result<(), StoreError> {
        let deleted = diesel::delete(document_types::table.find(id.as_str()))
            .execute(self.conn)
            .map_err(db)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn count_document_types(&mut self, ids: &DocumentTypeSelection) -> Result<usize, StoreError> {
        // Aggregates cannot take row locks, so load the ids and count them here.
        document_types::table
            .filter(document_types::id.eq_any(ids.as_strs()))
            .select(document_types::id)
            .for_share()
            .load::<String>(self.conn)
            .map(|found| found.len())
            .map_err(db)
    }

    fn insert_pending_documents(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<usize, StoreError> {
        let rows: Vec<DocumentRow> = types
            .iter()
            .map(|type_id| {
                DocumentRow::from(&DocumentRecord::pending(employee_id.clone(), type_id.clone()))
            })
            .collect();

        diesel::insert_into(documents::table)
            .values(&rows)
            .on_conflict((documents::employee_id, documents::document_type_id))
            .do_nothing()
            .execute(self.conn)
            .map_err(db)
    }

    fn documents_for(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<Vec<DocumentRecord>, StoreError> {
        documents::table
            .filter(documents::employee_id.eq(employee_id.as_str()))
            .filter(documents::document_type_id.eq_any(types.as_strs()))
            .order(documents::document_type_id.asc())
            .select(DocumentRow::as_select())
            .load(self.conn)
            .map(|rows| rows.into_iter().map(DocumentRecord::from).collect())
            .map_err(db)
    }

    fn delete_documents(
        &mut self,
        employee_id: &EmployeeId,
        types: &DocumentTypeSelection,
    ) -> Result<usize, StoreError> {
        diesel::delete(
            documents::table
                .filter(documents::employee_id.eq(employee_id.as_str()))
                .filter(documents::document_type_id.eq_any(types.as_strs())),
        )
        .execute(self.conn)
        .map_err(db)
    }

    fn lock_document(&mut self, id: &DocumentId) -> Result<Option<DocumentRecord>, StoreError> {
        documents::table
            .find(id.as_str())
            .select(DocumentRow::as_select())
            .for_update()
            .first(self.conn)
            .optional()
            .map(|row| row.map(DocumentRecord::from))
            .map_err(db)
    }

    fn mark_fulfilled(&mut self, id: &DocumentId) -> Result<(), StoreError> {
        let updated = diesel::update(documents::table.find(id.as_str()))
            .set(documents::pending.eq(false))
            .execute(self.conn)
            .map_err(db)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn list_documents(
        &mut self,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> Result<Vec<DocumentRecord>, StoreError> {
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        filtered(filter)
            .order(documents::id.asc())
            .limit(i64::from(page.size()))
            .offset(offset)
            .load::<DocumentRow>(self.conn)
            .map(|rows| rows.into_iter().map(DocumentRecord::from).collect())
            .map_err(db)
    }

    fn count_documents(&mut self, filter: &DocumentFilter) -> Result<u64, StoreError> {
        filtered(filter)
            .count()
            .get_result::<i64>(self.conn)
            .map(|count| u64::try_from(count).unwrap_or(0))
            .map_err(db)
    }

    fn employee_documents(
        &mut self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<(DocumentRecord, DocumentType)>, StoreError> {
        documents::table
            .inner_join(document_types::table)
            .filter(documents::employee_id.eq(employee_id.as_str()))
            .order(document_types::name.asc())
            .select((DocumentRow::as_select(), DocumentTypeRow::as_select()))
            .load::<(DocumentRow, DocumentTypeRow)>(self.conn)
            .map(|rows| {
                rows.into_iter()
                    .map(|(record, document_type)| (record.into(), document_type.into()))
                    .collect()
            })
            .map_err(db)
    }
}
