//! Shared CRM fixture: companies, people, relationships, quotes, financials.
//!
//! ```text
//! companies   1 BMW, 2 Mercedes, 3 Audi, 4 Volkswagen
//! people      1 Jan, 2 Piet, 3 Joris, 4 Korneel, 5 Dieter
//! employs     BMW: Jan, Piet   Mercedes: Joris   Audi: Joris, Korneel, Dieter
//! quotes      id  company  contact  responsible  deleted
//!              1  BMW      Jan      Piet
//!              2  BMW      Joris    Jan
//!              3  BMW      Korneel  Joris        yes
//!              4  Audi     Korneel  Korneel
//! ```
#![allow(dead_code)]

use std::sync::Arc;

use reportkit::executor::{QueryLog, SqliteExecutor};
use reportkit::model::{FormatOptions, Value};
use reportkit::report::{Report, ReportContext};
use reportkit::schema::Schema;

pub const FIXTURE_SQL: &str = "
CREATE TABLE people (
    id INTEGER PRIMARY KEY,
    first_name TEXT,
    last_name TEXT
);
CREATE TABLE companies (
    id INTEGER PRIMARY KEY,
    name TEXT,
    alpha TEXT,
    turnover REAL,
    updated_at TEXT
);
CREATE UNIQUE INDEX index_companies_on_name_and_alpha ON companies (name, alpha);
CREATE TABLE financials (
    id INTEGER PRIMARY KEY,
    financiable_type TEXT,
    financiable_id INTEGER,
    vat_no TEXT
);
CREATE UNIQUE INDEX index_financials_on_financiable ON financials (financiable_type, financiable_id);
CREATE TABLE relationships (
    id INTEGER PRIMARY KEY,
    company_id INTEGER,
    person_id INTEGER,
    function TEXT
);
CREATE TABLE quotes (
    id INTEGER PRIMARY KEY,
    company_id INTEGER,
    contact_id INTEGER,
    responsible_id INTEGER,
    description TEXT,
    deleted_at TEXT
);

INSERT INTO people (id, first_name, last_name) VALUES
    (1, 'Jan', 'Jansen'),
    (2, 'Piet', 'Pietersen'),
    (3, 'Joris', 'Driepinter'),
    (4, 'Korneel', 'Kalkoen'),
    (5, 'Dieter', 'Dietrich');
INSERT INTO companies (id, name, alpha, turnover, updated_at) VALUES
    (1, 'BMW', 'b', 4955642.5, '2012-03-01 10:00:00'),
    (2, 'Mercedes', 'm', 2300000, '2012-02-01 09:30:00'),
    (3, 'Audi', 'a', 3120000.25, '2012-01-15 16:45:00'),
    (4, 'Volkswagen', 'v', NULL, '2011-12-24 08:00:00');
INSERT INTO financials (id, financiable_type, financiable_id, vat_no) VALUES
    (1, 'Company', 1, 'DE123456789'),
    (2, 'Company', 3, 'DE811115368');
INSERT INTO relationships (id, company_id, person_id, function) VALUES
    (1, 1, 1, 'director'),
    (2, 1, 2, 'sales'),
    (3, 2, 3, 'director'),
    (4, 3, 3, 'advisor'),
    (5, 3, 4, 'sales'),
    (6, 3, 5, 'support');
INSERT INTO quotes (id, company_id, contact_id, responsible_id, description, deleted_at) VALUES
    (1, 1, 1, 2, 'quote 1', NULL),
    (2, 1, 3, 1, 'quote 2', NULL),
    (3, 1, 4, 3, 'quote 3', '2012-04-01 12:00:00'),
    (4, 3, 4, 4, 'quote 4', NULL);
";

pub const SCHEMA_TOML: &str = r#"
[entities.Company]
table = "companies"
fields = { name = "generic", alpha = "generic", turnover = "money", updated_at = "time" }
associations = [
    { name = "quotes", kind = "has_many" },
    { name = "relationships", kind = "has_many" },
    { name = "people", kind = "through", through = "relationships", source = "person" },
    { name = "financial", kind = "has_one", as = "financiable" },
]

[[entities.Company.columns]]
name = "people_count"
kind = "integer"
fields = [{ path = "people", field = "id", aggregate = "count" }]

[[entities.Company.columns]]
name = "people_sum"
kind = "integer"
fields = [{ path = "people", field = "id", aggregate = "sum" }]

[[entities.Company.columns]]
name = "quote_count"
kind = "integer"
label = "Quotes"
fields = [{ path = "quotes", field = "id", aggregate = "count" }]

# Companies sharing at least one person with this one, itself included.
[[entities.Company.columns]]
name = "related_count"
kind = "integer"
fields = [
    { path = "relationships", joins = [{ table = "relationships", on = { person_id = "person_id" } }], field = "company_id", aggregate = "count_distinct" },
]

[[entities.Company.columns]]
name = "people_names"
fields = [{ path = "people", field = "first_name", aggregate = "group_concat" }]

[[entities.Company.columns]]
name = "turnover_or_zero"
kind = "money"
fields = [{ field = "turnover", transform = { coalesce = [0] } }]

[[entities.Company.columns]]
name = "doubled_turnover"
kind = "money"
fields = [{ field = "turnover", transform = { mul = 2 } }]

[entities.Person]
table = "people"
fields = { first_name = "generic", last_name = "generic" }
associations = [
    { name = "relationships", kind = "has_many" },
    { name = "companies", kind = "through", through = "relationships", source = "company" },
]

[entities.Relationship]
table = "relationships"
fields = { company_id = "integer", person_id = "integer", function = "generic" }
associations = [
    { name = "company", kind = "belongs_to" },
    { name = "person", kind = "belongs_to" },
]

[entities.Quote]
table = "quotes"
fields = { company_id = "integer", contact_id = "integer", responsible_id = "integer", description = "generic", deleted_at = "time" }
associations = [
    { name = "company", kind = "belongs_to" },
    { name = "contact", kind = "belongs_to", target = "Person" },
    { name = "responsible", kind = "belongs_to", target = "Person" },
]

[[entities.Quote.columns]]
name = "contact_name"
fields = [{ path = "contact", field = "first_name", transform = { concat = [" ", { field = "last_name" }] } }]

[entities.Financial]
table = "financials"
fields = { financiable_type = "generic", financiable_id = "integer", vat_no = "generic" }
"#;

pub fn schema() -> Schema {
    Schema::from_toml_str(SCHEMA_TOML).unwrap()
}

/// In-memory database loaded with the fixture, wrapped in a statement log.
pub fn database() -> Arc<QueryLog<SqliteExecutor>> {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    exec.execute_batch(FIXTURE_SQL).unwrap();
    Arc::new(QueryLog::new(exec))
}

/// A report over a fresh fixture database, plus the log its queries land in.
pub fn report(entity: &str, columns: &[&str]) -> (Report, Arc<QueryLog<SqliteExecutor>>) {
    let log = database();
    let ctx = ReportContext::new(log.clone());
    let report = Report::new(&schema(), entity, columns, &FormatOptions::default(), ctx).unwrap();
    (report, log)
}

pub fn int(i: i64) -> Value {
    Value::Int(i)
}

pub fn text(s: &str) -> Value {
    Value::from(s)
}

/// Values of one column, top to bottom.
pub fn column(report: &Report, name: &str) -> Vec<Value> {
    report
        .table()
        .unwrap()
        .column_values(name)
        .unwrap()
        .into_iter()
        .cloned()
        .collect()
}

/// Rows of the report as cast values.
pub fn rows(report: &Report) -> Vec<Vec<Value>> {
    report.table().unwrap().rows().to_vec()
}
