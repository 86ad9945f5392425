//! SQL-backed fact relation -- the hard part.
//!
//! Compiles a batch of goals created against the same table into as few
//! SQL queries as possible while preserving full unification semantics:
//! per-goal registration, peer discovery for query merging and cache
//! sharing, query construction, a row cache with subsumption,
//! column-by-column row unification, symmetric desugaring, and the
//! failure semantics of a rejected query surfacing as a database error.
//!
//! The `rusqlite` connection/statement idiom follows ordinary SQLite-backed
//! Rust code, composed here with a batching and peer-discovery algorithm
//! of its own.
// krelation 2024

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::EngineResult;
use crate::goal::{BoxGoal, Goal};
use crate::registry::{GoalHandle, GoalRegistry};
use crate::stream::{Item, SStream};
use crate::subst::{walk, Substitution};
use crate::term::Term;
use crate::unify::unify;

/// One fetched database row, keyed by column name.
pub type Row = HashMap<String, Term>;

/// The `ROW_CACHE` meta key: per-substitution, per-goal cached rows.
pub type RowCache = HashMap<GoalHandle, Rc<Vec<Row>>>;

/// Batch size and the two feature toggles governing how a relation
/// batches and caches its goals.
#[derive(Debug, Clone)]
pub struct RelationConfig {
    pub batch_size: usize,
    pub enable_caching: bool,
    pub enable_query_merging: bool,
}

impl Default for RelationConfig {
    fn default() -> Self {
        RelationConfig {
            batch_size: 100,
            enable_caching: true,
            enable_query_merging: true,
        }
    }
}

impl RelationConfig {
    pub fn with_batch_size(mut self, n: usize) -> Self { self.batch_size = n; self }
    pub fn with_caching(mut self, on: bool) -> Self { self.enable_caching = on; self }
    pub fn with_query_merging(mut self, on: bool) -> Self { self.enable_query_merging = on; self }
}

/// A column -> term mapping, in declaration order (declaration order is
/// kept only for deterministic `Display`; comparisons are order-independent).
pub type QueryObject = Vec<(String, Term)>;

#[derive(Debug, Clone)]
pub struct SqlGoalQuery {
    pub columns: QueryObject,
    pub filters: Vec<WhereCondition>,
}

/// Comparison operators the abstract data store understands. The
/// value-matching side of the batching engine (per-substitution `wheres`)
/// only ever emits `Eq`/`In`; the rest are reachable through a goal's
/// static `filters`, which hold regardless of which substitution is
/// flowing through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOp { Eq, In, Gt, Lt, Gte, Lte, Like }

#[derive(Debug, Clone, PartialEq)]
pub struct WhereCondition {
    pub column: String,
    pub op: WhereOp,
    pub values: Vec<Term>,
}

/// The abstract data store a relation queries against: one `execute_query`
/// method. The core is generic over this trait so it does not assume a
/// specific SQL dialect.
pub trait DataStore {
    fn execute_query(
        &self,
        table: &str,
        select_columns: &[String],
        where_conditions: &[WhereCondition],
        limit: Option<usize>,
    ) -> EngineResult<Vec<Row>>;
}

fn value_to_term(v: ValueRef) -> Term {
    match v {
        ValueRef::Null => Term::Null,
        ValueRef::Integer(i) => Term::Int(i),
        ValueRef::Real(f) => Term::Float(f),
        ValueRef::Text(t) => Term::Str(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Term::Str(String::from_utf8_lossy(b).into_owned()),
    }
}

fn term_to_sql(t: &Term) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match t {
        Term::Int(i) => Value::Integer(*i),
        Term::Float(f) => Value::Real(*f),
        Term::Str(s) => Value::Text(s.clone()),
        Term::Bool(b) => Value::Integer(if *b { 1 } else { 0 }),
        Term::Null => Value::Null,
        other => Value::Text(other.to_string()),
    }
}

/// SQLite-backed implementation of [DataStore].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> SqliteStore {
        SqliteStore { conn }
    }

    pub fn connection(&self) -> &Connection { &self.conn }
}

fn op_sql(op: WhereOp, placeholders: usize) -> String {
    match op {
        WhereOp::Eq => "= ?".to_string(),
        WhereOp::Gt => "> ?".to_string(),
        WhereOp::Lt => "< ?".to_string(),
        WhereOp::Gte => ">= ?".to_string(),
        WhereOp::Lte => "<= ?".to_string(),
        WhereOp::Like => "LIKE ?".to_string(),
        WhereOp::In => {
            let qs = vec!["?"; placeholders].join(", ");
            format!("IN ({qs})")
        }
    }
}

impl DataStore for SqliteStore {
    fn execute_query(
        &self,
        table: &str,
        select_columns: &[String],
        where_conditions: &[WhereCondition],
        limit: Option<usize>,
    ) -> EngineResult<Vec<Row>> {
        let select = if select_columns.is_empty() {
            "*".to_string()
        } else {
            select_columns.join(", ")
        };
        let mut sql = format!("SELECT {select} FROM {table}");
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        if !where_conditions.is_empty() {
            let mut clauses = Vec::new();
            for cond in where_conditions {
                clauses.push(format!("{} {}", cond.column, op_sql(cond.op, cond.values.len())));
                for v in &cond.values { params.push(term_to_sql(v)); }
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let col_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |r| {
            let mut row = Row::new();
            for (i, name) in col_names.iter().enumerate() {
                row.insert(name.clone(), value_to_term(r.get_ref(i)?));
            }
            Ok(row)
        })?;
        let mut out = Vec::new();
        for row in rows { out.push(row?); }
        Ok(out)
    }
}

fn column_compatible(a: &Term, b: &Term, rep: &Substitution) -> bool {
    let wa = walk(a, rep);
    let wb = walk(b, rep);
    match (&wa, &wb) {
        (Term::Var(x), Term::Var(y)) => x.id == y.id,
        (Term::Var(_), _) | (_, Term::Var(_)) => false,
        _ => wa == wb,
    }
}

fn is_merge_compatible(a: &QueryObject, b: &QueryObject, rep: &Substitution) -> bool {
    let a_cols: BTreeSet<&str> = a.iter().map(|(c, _)| c.as_str()).collect();
    let b_cols: BTreeSet<&str> = b.iter().map(|(c, _)| c.as_str()).collect();
    if a_cols != b_cols { return false; }
    a.iter().all(|(c, t)| {
        let (_, t2) = b.iter().find(|(c2, _)| c2 == c).unwrap();
        column_compatible(t, t2, rep)
    })
}

fn is_cache_compatible(a: &QueryObject, b: &QueryObject, rep: &Substitution) -> bool {
    let mut shared = false;
    for (c, t) in a {
        if let Some((_, t2)) = b.iter().find(|(c2, _)| c2 == c) {
            shared = true;
            if !column_compatible(t, t2, rep) { return false; }
        }
    }
    shared
}

/// One flushed query's result, keyed implicitly by table, select columns,
/// and where-value sets -- a canonical, deterministic encoding of those
/// three parts rather than a stringified map key, so subsumption is a
/// structural comparison instead of an exact-match lookup.
struct CacheEntry {
    table: String,
    select: BTreeSet<String>,
    wheres: BTreeMap<String, BTreeSet<String>>,
    filters_key: String,
    rows: Rc<Vec<Row>>,
}

#[derive(Default)]
struct SubsumptionCache {
    entries: Vec<CacheEntry>,
}

fn term_set_to_strings(values: &[Term]) -> BTreeSet<String> {
    values.iter().map(|t| t.to_string()).collect()
}

/// A canonical string for a goal's static filters. Filters like `Gt`/`Lt`
/// don't subsume each other the way an Eq/In value set does (`number >
/// 50` doesn't cover `number > 30`), so two cache entries are only
/// interchangeable when their filters are exactly, textually the same.
fn filters_key(filters: &[WhereCondition]) -> String {
    filters
        .iter()
        .map(|c| format!("{}{:?}{:?}", c.column, c.op, c.values))
        .collect::<Vec<_>>()
        .join(",")
}

impl SubsumptionCache {
    fn lookup_subsuming(
        &self,
        table: &str,
        select: &BTreeSet<String>,
        wheres: &BTreeMap<String, Vec<Term>>,
        filters_key: &str,
    ) -> Option<Rc<Vec<Row>>> {
        let wheres_str: BTreeMap<String, BTreeSet<String>> =
            wheres.iter().map(|(k, v)| (k.clone(), term_set_to_strings(v))).collect();
        for entry in &self.entries {
            if entry.table != table { continue; }
            if entry.filters_key != filters_key { continue; }
            if !select.is_subset(&entry.select) { continue; }
            let subsumes = entry.wheres.iter().all(|(k, vals)| {
                match wheres_str.get(k) {
                    Some(requested) => requested.is_subset(vals),
                    None => false,
                }
            });
            if subsumes {
                return Some(filter_project(&entry.rows, select, &wheres_str));
            }
        }
        None
    }

    fn insert(
        &mut self,
        table: &str,
        select: BTreeSet<String>,
        wheres: BTreeMap<String, Vec<Term>>,
        filters_key: String,
        rows: Rc<Vec<Row>>,
    ) {
        let wheres_str = wheres.iter().map(|(k, v)| (k.clone(), term_set_to_strings(v))).collect();
        self.entries.push(CacheEntry { table: table.to_string(), select, wheres: wheres_str, filters_key, rows });
    }
}

fn filter_project(rows: &[Row], select: &BTreeSet<String>, wheres: &BTreeMap<String, BTreeSet<String>>) -> Rc<Vec<Row>> {
    let filtered: Vec<Row> = rows
        .iter()
        .filter(|row| {
            wheres.iter().all(|(col, vals)| {
                row.get(col).map(|v| vals.contains(&v.to_string())).unwrap_or(false)
            })
        })
        .map(|row| row.iter().filter(|(k, _)| select.contains(*k)).map(|(k, v)| (k.clone(), v.clone())).collect())
        .collect();
    Rc::new(filtered)
}

struct SqlGoalShared {
    handle: GoalHandle,
    table: String,
    columns: QueryObject,
    filters: Vec<WhereCondition>,
    store: Rc<dyn DataStore>,
    registry: Rc<RefCell<GoalRegistry<SqlGoalQuery>>>,
    cache: Rc<RefCell<SubsumptionCache>>,
    config: RelationConfig,
    query_count: Rc<Cell<usize>>,
}

impl SqlGoalShared {
    fn peers(&self, all_goals: &HashSet<GoalHandle>, rep: &Substitution) -> (Vec<GoalHandle>, Vec<GoalHandle>) {
        let registry = self.registry.borrow();
        let mut merge = Vec::new();
        let mut cache = Vec::new();
        for h in all_goals {
            if *h == self.handle { continue; }
            let Some(rec) = registry.get(*h) else { continue };
            if rec.table != self.table { continue; }
            // Goals carrying different static filters are never merge or
            // cache peers: a batched query built for one side's filters
            // would silently apply (or omit) a condition the other side
            // never asked for.
            if rec.query.filters != self.filters { continue; }
            if self.config.enable_query_merging && is_merge_compatible(&self.columns, &rec.query.columns, rep) {
                merge.push(*h);
            }
            if self.config.enable_caching && is_cache_compatible(&self.columns, &rec.query.columns, rep) {
                cache.push(*h);
            }
        }
        (merge, cache)
    }

    fn select_columns(&self, merge: &[GoalHandle], cache: &[GoalHandle]) -> BTreeSet<String> {
        let registry = self.registry.borrow();
        let mut cols: BTreeSet<String> = self.columns.iter().filter(|(_, t)| t.is_var()).map(|(c, _)| c.clone()).collect();
        for h in merge.iter().chain(cache.iter()) {
            if let Some(rec) = registry.get(*h) {
                for (c, t) in &rec.query.columns {
                    if t.is_var() { cols.insert(c.clone()); }
                }
            }
        }
        if cols.is_empty() {
            cols = self.columns.iter().map(|(c, _)| c.clone()).collect();
        }
        cols
    }

    fn where_values(&self, chunk: &[Substitution]) -> BTreeMap<String, Vec<Term>> {
        let mut wheres = BTreeMap::new();
        for (col, term) in &self.columns {
            match term {
                Term::Var(_) => {
                    let mut values = Vec::new();
                    for s in chunk {
                        let w = walk(term, s);
                        if !w.is_var() && !values.contains(&w) { values.push(w); }
                    }
                    if !values.is_empty() { wheres.insert(col.clone(), values); }
                }
                ground => { wheres.insert(col.clone(), vec![ground.clone()]); }
            }
        }
        wheres
    }

    /// Runs one flush: returns the fetched rows plus the peers whose
    /// cache should be populated from this flush.
    fn flush(&self, chunk: &[Substitution]) -> EngineResult<(Rc<Vec<Row>>, Vec<GoalHandle>)> {
        let rep = &chunk[0];
        let (merge, cache_peers) = self.peers(&rep.meta.all_goals, rep);
        let select = self.select_columns(&merge, &cache_peers);
        let wheres = self.where_values(chunk);
        let fkey = filters_key(&self.filters);

        if self.config.enable_caching {
            if let Some(rows) = self.cache.borrow().lookup_subsuming(&self.table, &select, &wheres, &fkey) {
                tracing::debug!(table = %self.table, "subsumption cache hit, no query issued");
                let mut all_peers = merge;
                all_peers.extend(cache_peers);
                return Ok((rows, all_peers));
            }
        }

        let mut conditions: Vec<WhereCondition> = wheres
            .iter()
            .map(|(col, vals)| WhereCondition {
                column: col.clone(),
                op: if vals.len() == 1 { WhereOp::Eq } else { WhereOp::In },
                values: vals.clone(),
            })
            .collect();
        conditions.extend(self.filters.iter().cloned());

        self.query_count.set(self.query_count.get() + 1);
        let select_vec: Vec<String> = select.iter().cloned().collect();
        tracing::debug!(table = %self.table, select = ?select_vec, peers = merge.len() + cache_peers.len(), "flushing sql batch");
        let rows = self.store.execute_query(&self.table, &select_vec, &conditions, None)?;
        let rows = Rc::new(rows);
        tracing::trace!(table = %self.table, rows = rows.len(), "sql batch returned rows");

        if self.config.enable_caching {
            self.cache.borrow_mut().insert(&self.table, select, wheres, fkey, Rc::clone(&rows));
        }

        let mut all_peers = merge;
        all_peers.extend(cache_peers);
        Ok((rows, all_peers))
    }

    fn unify_row(&self, row: &Row, s: &Substitution) -> Option<Substitution> {
        let mut cur = s.clone();
        for (col, term) in &self.columns {
            match row.get(col) {
                Some(value) => { cur = unify(term, value, &cur)?; }
                None => {
                    if term.is_var() { return None; } // missing SELECT member
                }
            }
        }
        Some(cur)
    }

    fn attach_cache(&self, s: &Substitution, peers: &[GoalHandle], rows: &Rc<Vec<Row>>) -> Substitution {
        if peers.is_empty() { return s.clone(); }
        let mut row_cache = (*s.meta.row_cache).clone();
        for h in peers { row_cache.insert(*h, Rc::clone(rows)); }
        let mut meta = s.meta.clone();
        meta.row_cache = Rc::new(row_cache);
        s.with_meta(meta)
    }

    fn emit(&self, chunk: &[Substitution], rows: &Rc<Vec<Row>>, peers: &[GoalHandle]) -> Vec<Item> {
        let mut out = Vec::new();
        for s in chunk {
            let s = self.attach_cache(s, peers, rows);
            for row in rows.iter() {
                if let Some(result) = self.unify_row(row, &s) {
                    out.push(Ok(result));
                }
            }
        }
        out
    }

    fn emit_from_cache(&self, rows: &Rc<Vec<Row>>, s: &Substitution) -> Vec<Item> {
        rows.iter().filter_map(|row| self.unify_row(row, s)).map(Ok).collect()
    }
}

/// A goal created from a [SqlRelationFactory]: drains its input stream,
/// splits into cache hits and pending substitutions, batches the
/// pending ones per table, and emits one unified result per matching row.
pub struct SqlGoal {
    shared: Rc<SqlGoalShared>,
}

impl Goal for SqlGoal {
    fn apply(&self, input: SStream) -> SStream {
        let shared = Rc::clone(&self.shared);
        let items = match input.collect_results() {
            Ok(v) => v,
            Err(e) => return SStream::error(e),
        };

        let mut outputs: Vec<Item> = Vec::new();
        let mut pending: Vec<Substitution> = Vec::new();
        for s in items {
            let cached = if shared.config.enable_caching {
                s.meta.row_cache.get(&shared.handle).cloned()
            } else {
                None
            };
            match cached {
                Some(rows) => {
                    tracing::trace!(handle = shared.handle.0, "row cache hit, skipping batch");
                    outputs.extend(shared.emit_from_cache(&rows, &s));
                }
                None => pending.push(s),
            }
        }

        let batch_size = shared.config.batch_size.max(1);
        for chunk in pending.chunks(batch_size) {
            match shared.flush(chunk) {
                Ok((rows, peers)) => outputs.extend(shared.emit(chunk, &rows, &peers)),
                Err(e) => outputs.push(Err(e)),
            }
        }

        SStream::new(crate::stream::Cancel::new(), outputs.into_iter())
    }

    fn goal_handle(&self) -> Option<GoalHandle> {
        Some(self.shared.handle)
    }
}

/// Factory for SQL fact-relation goals sharing one database handle,
/// registry, and subsumption cache: every goal built from the same
/// factory can be discovered as a merge or cache peer of any other.
pub struct SqlRelationFactory {
    store: Rc<dyn DataStore>,
    registry: Rc<RefCell<GoalRegistry<SqlGoalQuery>>>,
    cache: Rc<RefCell<SubsumptionCache>>,
    query_count: Rc<Cell<usize>>,
}

impl SqlRelationFactory {
    pub fn new(store: impl DataStore + 'static) -> SqlRelationFactory {
        SqlRelationFactory {
            store: Rc::new(store),
            registry: Rc::new(RefCell::new(GoalRegistry::new())),
            cache: Rc::new(RefCell::new(SubsumptionCache::default())),
            query_count: Rc::new(Cell::new(0)),
        }
    }

    /// Number of SQL queries actually issued so far (for testing batching
    /// and cache-sharing behaviour).
    pub fn query_count(&self) -> usize {
        self.query_count.get()
    }

    pub fn make(&self, table: &str, columns: Vec<(&str, Term)>, config: RelationConfig) -> BoxGoal {
        self.make_filtered(table, columns, Vec::new(), config)
    }

    /// Like [SqlRelationFactory::make], plus static `filters` -- conditions
    /// on a column (e.g. `number > 50`) that hold regardless of which
    /// substitution is flowing through, rather than being derived per-chunk
    /// from a column's walked value the way the ordinary `Eq`/`In` wheres
    /// are.
    pub fn make_filtered(
        &self,
        table: &str,
        columns: Vec<(&str, Term)>,
        filters: Vec<WhereCondition>,
        config: RelationConfig,
    ) -> BoxGoal {
        let columns: QueryObject = columns.into_iter().map(|(c, t)| (c.to_string(), t)).collect();
        let handle = self.registry.borrow_mut().register(
            table,
            SqlGoalQuery { columns: columns.clone(), filters: filters.clone() },
        );
        Rc::new(SqlGoal {
            shared: Rc::new(SqlGoalShared {
                handle,
                table: table.to_string(),
                columns,
                filters,
                store: Rc::clone(&self.store),
                registry: Rc::clone(&self.registry),
                cache: Rc::clone(&self.cache),
                config,
                query_count: Rc::clone(&self.query_count),
            }),
        })
    }

    /// Desugars a two-column symmetric relation into the disjunction of
    /// the original and swapped column mappings.
    pub fn make_symmetric(
        &self,
        table: &str,
        col_a: &str,
        col_b: &str,
        a: Term,
        b: Term,
        config: RelationConfig,
    ) -> BoxGoal {
        let forward = self.make(table, vec![(col_a, a.clone()), (col_b, b.clone())], config.clone());
        let backward = self.make(table, vec![(col_a, b), (col_b, a)], config);
        crate::goal::or(vec![forward, backward])
    }
}
