use serde_json::Value;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
    Vector(Vec<f32>),
    /// `None` binds SQL `NULL`.
    Json(Option<Value>),
}

/// SQL text plus its positional parameters.
///
/// User-supplied data only ever enters through [`bind`](Statement::bind), so
/// `sql` is always a fixed skeleton with `$1..$n` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter and return its placeholder (`$n`).
    pub fn bind(&mut self, param: Param) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Add a parameter to a statement whose SQL already references it.
    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }
}
