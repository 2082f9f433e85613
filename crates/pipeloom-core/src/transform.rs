//! Transformation requests
//!
//! A free-text instruction is turned into a list of [`TransformOp`] steps by
//! a swappable [`InstructionInterpreter`], validated against the target
//! table's columns, and kept as the pending plan until it is committed.
//! Rows can be previewed against the plan before committing (see
//! [`crate::interpreter`]).
//!
//! # Instruction grammar ([`KeywordInterpreter`])
//!
//! Steps are separated by `;` or `then`; separators inside quotes are part
//! of the literal:
//!
//! ```text
//! rename column cust_id to customer_id
//! cast total as decimal
//! lowercase email            (also: uppercase, trim, normalize email to lowercase)
//! filter where status = 'active'
//! drop column internal_notes
//! fill nulls in country with 'unknown'
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};
use crate::outcome::Outcome;
use crate::schema::{Table, TableSelection};

/// Outcome of processing an instruction; replaced by the next submission
pub type TransformationResult = Outcome;

/// Target type of a cast
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    /// Whole numbers
    Integer,
    /// Floating point numbers
    Decimal,
    /// Strings
    Text,
    /// true/false
    Boolean,
}

impl CastType {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "int" | "integer" | "bigint" | "smallint" => Some(Self::Integer),
            "decimal" | "numeric" | "float" | "double" | "real" | "number" => Some(Self::Decimal),
            "text" | "string" | "varchar" | "char" => Some(Self::Text),
            "bool" | "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Column type name used when the schema is rewritten
    pub fn column_type(&self) -> &'static str {
        match self {
            Self::Integer => "int",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }
}

/// Normalization applied to text values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Lowercase letters
    Lowercase,
    /// Uppercase letters
    Uppercase,
    /// Strip surrounding whitespace
    Trim,
}

/// Comparison used by a filter step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// substring match
    Contains,
}

impl FilterOperator {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "=" | "==" | "is" | "equals" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            "contains" | "like" => Some(Self::Contains),
            _ => None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Contains => "contains",
        }
    }
}

/// One transformation step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    /// Rename a column
    Rename {
        /// Current name
        column: String,
        /// New name
        to: String,
    },

    /// Convert a column's values to another type
    Cast {
        /// Column to convert
        column: String,
        /// Target type
        to: CastType,
    },

    /// Normalize text values
    Normalize {
        /// Column to normalize
        column: String,
        /// Normalization
        mode: NormalizeMode,
    },

    /// Keep only rows matching a condition
    Filter {
        /// Column compared
        column: String,
        /// Comparison
        operator: FilterOperator,
        /// Right-hand side
        value: Value,
    },

    /// Remove a column
    Drop {
        /// Column to remove
        column: String,
    },

    /// Replace null or missing values
    FillNull {
        /// Column to fill
        column: String,
        /// Replacement
        value: Value,
    },
}

impl TransformOp {
    /// Step name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rename { .. } => "rename",
            Self::Cast { .. } => "cast",
            Self::Normalize { .. } => "normalize",
            Self::Filter { .. } => "filter",
            Self::Drop { .. } => "drop",
            Self::FillNull { .. } => "fill_null",
        }
    }

    /// Column the step reads
    pub fn column(&self) -> &str {
        match self {
            Self::Rename { column, .. }
            | Self::Cast { column, .. }
            | Self::Normalize { column, .. }
            | Self::Filter { column, .. }
            | Self::Drop { column }
            | Self::FillNull { column, .. } => column,
        }
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rename { column, to } => write!(f, "rename {} to {}", column, to),
            Self::Cast { column, to } => write!(f, "cast {} as {}", column, to.column_type()),
            Self::Normalize { column, mode } => {
                let mode = match mode {
                    NormalizeMode::Lowercase => "lowercase",
                    NormalizeMode::Uppercase => "uppercase",
                    NormalizeMode::Trim => "trim",
                };
                write!(f, "{} {}", mode, column)
            }
            Self::Filter {
                column,
                operator,
                value,
            } => write!(f, "filter {} {} {}", column, operator.symbol(), value),
            Self::Drop { column } => write!(f, "drop {}", column),
            Self::FillNull { column, value } => write!(f, "fill nulls in {} with {}", column, value),
        }
    }
}

/// Turns free text into transformation steps
pub trait InstructionInterpreter: Send + Sync + fmt::Debug {
    /// Interpret `instruction`
    fn interpret(&self, instruction: &str) -> Result<Vec<TransformOp>>;
}

/// Accepts any instruction without producing steps.
///
/// Matches the behaviour of a backend that only acknowledges requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughInterpreter;

impl InstructionInterpreter for PassthroughInterpreter {
    fn interpret(&self, _instruction: &str) -> Result<Vec<TransformOp>> {
        Ok(Vec::new())
    }
}

const IDENT: &str = r#"(?:`([^`]+)`|"([^"]+)"|([A-Za-z_][A-Za-z0-9_]*))"#;

static STEP_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:;|\bthen\b)\s*").expect("valid separator pattern"));

static RENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^rename\s+(?:column\s+)?{IDENT}\s+(?:to|as)\s+{IDENT}$"
    ))
    .expect("valid rename pattern")
});

static CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:cast|convert)\s+(?:column\s+)?{IDENT}\s+(?:to|as|into)\s+([A-Za-z]+)$"
    ))
    .expect("valid cast pattern")
});

static CASE_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(lowercase|uppercase|trim)\s+(?:column\s+)?{IDENT}$"
    ))
    .expect("valid case pattern")
});

static NORMALIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^normali[sz]e\s+(?:column\s+)?{IDENT}(?:\s+(?:to|as)\s+(lowercase|lower|uppercase|upper|trimmed|trim))?$"
    ))
    .expect("valid normalize pattern")
});

static FILTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:filter|keep\s+rows|where)\s+(?:where\s+)?{IDENT}\s*(==|!=|<>|>=|<=|=|>|<|\bcontains\b|\blike\b|\bequals\b|\bis\b)\s*(.+)$"
    ))
    .expect("valid filter pattern")
});

static DROP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^(?:drop|remove|delete)\s+(?:column\s+)?{IDENT}$"))
        .expect("valid drop pattern")
});

static FILL_NULL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:fill|replace)\s+(?:nulls?|missing(?:\s+values)?|empty(?:\s+values)?)\s+in\s+{IDENT}\s+with\s+(.+)$"
    ))
    .expect("valid fill pattern")
});

/// Pick whichever alternative of an [`IDENT`] group matched, starting at `first`
fn ident(caps: &regex::Captures<'_>, first: usize) -> String {
    (first..first + 3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Split an instruction into steps on `;` and `then`, ignoring separators
/// inside quotes or backticks
fn split_steps(instruction: &str) -> Vec<&str> {
    let mut quoted = Vec::new();
    let mut open: Option<(char, usize)> = None;
    for (i, c) in instruction.char_indices() {
        match open {
            Some((q, start)) if c == q => {
                quoted.push(start..i);
                open = None;
            }
            None if matches!(c, '\'' | '"' | '`') => open = Some((c, i)),
            _ => {}
        }
    }

    let mut steps = Vec::new();
    let mut rest = 0;
    for sep in STEP_SEPARATOR.find_iter(instruction) {
        if quoted.iter().any(|span| span.contains(&sep.start())) {
            continue;
        }
        steps.push(&instruction[rest..sep.start()]);
        rest = sep.end();
    }
    steps.push(&instruction[rest..]);
    steps
}

/// Parse a literal: quoted string, number, boolean, null or bare word
fn literal(raw: &str) -> Value {
    let raw = raw.trim();
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Value::String(raw[1..raw.len() - 1].to_string());
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/// Regex based interpreter for the keyword grammar in the module docs
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordInterpreter;

impl KeywordInterpreter {
    fn interpret_step(&self, step: &str) -> Option<TransformOp> {
        if let Some(caps) = RENAME.captures(step) {
            return Some(TransformOp::Rename {
                column: ident(&caps, 1),
                to: ident(&caps, 4),
            });
        }
        if let Some(caps) = CAST.captures(step) {
            let to = CastType::parse(&caps[4])?;
            return Some(TransformOp::Cast {
                column: ident(&caps, 1),
                to,
            });
        }
        if let Some(caps) = CASE_WORD.captures(step) {
            let mode = match caps[1].to_ascii_lowercase().as_str() {
                "lowercase" => NormalizeMode::Lowercase,
                "uppercase" => NormalizeMode::Uppercase,
                _ => NormalizeMode::Trim,
            };
            return Some(TransformOp::Normalize {
                column: ident(&caps, 2),
                mode,
            });
        }
        if let Some(caps) = NORMALIZE.captures(step) {
            let mode = match caps.get(4).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(m) if m.starts_with("upper") => NormalizeMode::Uppercase,
                Some(m) if m.starts_with("trim") => NormalizeMode::Trim,
                _ => NormalizeMode::Lowercase,
            };
            return Some(TransformOp::Normalize {
                column: ident(&caps, 1),
                mode,
            });
        }
        if let Some(caps) = FILTER.captures(step) {
            let operator = FilterOperator::parse(&caps[4])?;
            return Some(TransformOp::Filter {
                column: ident(&caps, 1),
                operator,
                value: literal(&caps[5]),
            });
        }
        if let Some(caps) = FILL_NULL.captures(step) {
            return Some(TransformOp::FillNull {
                column: ident(&caps, 1),
                value: literal(&caps[4]),
            });
        }
        if let Some(caps) = DROP.captures(step) {
            return Some(TransformOp::Drop {
                column: ident(&caps, 1),
            });
        }
        None
    }
}

impl InstructionInterpreter for KeywordInterpreter {
    fn interpret(&self, instruction: &str) -> Result<Vec<TransformOp>> {
        let mut ops = Vec::new();
        for step in split_steps(instruction.trim()) {
            let step = step.trim().trim_end_matches('.');
            if step.is_empty() {
                continue;
            }
            let op = self.interpret_step(step).ok_or_else(|| Error::Interpret {
                instruction: instruction.to_string(),
                message: format!("unrecognised step '{}'", step),
            })?;
            ops.push(op);
        }
        if ops.is_empty() {
            return Err(Error::Interpret {
                instruction: instruction.to_string(),
                message: "no steps found".to_string(),
            });
        }
        Ok(ops)
    }
}

/// Check `ops` in order against `table`'s columns.
///
/// Renames and drops change the visible columns for later steps.
pub fn validate_ops(table: &Table, ops: &[TransformOp]) -> Result<()> {
    let mut columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
    for op in ops {
        let column = op.column();
        let Some(index) = columns.iter().position(|c| c == column) else {
            return Err(Error::TransformError {
                transform: op.name().to_string(),
                message: format!("column '{}' does not exist in table '{}'", column, table.name),
            });
        };
        match op {
            TransformOp::Rename { to, .. } => {
                if columns.iter().any(|c| c == to) {
                    return Err(Error::TransformError {
                        transform: op.name().to_string(),
                        message: format!("column '{}' already exists", to),
                    });
                }
                columns[index] = to.clone();
            }
            TransformOp::Drop { .. } => {
                columns.remove(index);
            }
            _ => {}
        }
    }
    Ok(())
}

/// What to transform and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationRequest {
    /// Free-text instruction
    pub instruction: String,
    /// Schema of the target table
    pub schema: String,
    /// Target table
    pub table: String,
}

impl TransformationRequest {
    /// Create a request
    pub fn new(
        instruction: impl Into<String>,
        table: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            instruction: instruction.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.instruction.trim().is_empty()
            && !self.table.trim().is_empty()
            && !self.schema.trim().is_empty()
    }
}

/// An interpreted, validated instruction waiting to be committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    /// Table the plan applies to
    pub target: TableSelection,
    /// Original instruction
    pub instruction: String,
    /// Steps, in order
    pub ops: Vec<TransformOp>,
}

fn default_interpreter() -> Box<dyn InstructionInterpreter> {
    Box::new(KeywordInterpreter)
}

/// Processes transformation requests, keeping only the latest result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationProcessor {
    #[serde(skip, default = "default_interpreter")]
    interpreter: Box<dyn InstructionInterpreter>,

    /// Result of the last submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processing_result: Option<TransformationResult>,

    /// Plan produced by the last successful submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<TransformPlan>,
}

impl Default for TransformationProcessor {
    fn default() -> Self {
        Self::new(default_interpreter())
    }
}

impl TransformationProcessor {
    /// Create a processor using `interpreter`
    pub fn new(interpreter: Box<dyn InstructionInterpreter>) -> Self {
        Self {
            interpreter,
            processing_result: None,
            pending: None,
        }
    }

    /// Swap the interpreter, keeping the last result
    pub fn set_interpreter(&mut self, interpreter: Box<dyn InstructionInterpreter>) {
        self.interpreter = interpreter;
    }

    /// Result of the last submission
    pub fn processing_result(&self) -> Option<&TransformationResult> {
        self.processing_result.as_ref()
    }

    /// Plan waiting to be committed
    pub fn pending(&self) -> Option<&TransformPlan> {
        self.pending.as_ref()
    }

    /// Process an instruction against `(schema, table)`.
    ///
    /// Returns `None` and leaves the previous result untouched when the
    /// instruction, table or schema is blank. Otherwise the new result
    /// replaces the previous one. `metadata` is the target table's
    /// description when known; steps naming unknown columns then fail.
    pub fn process(
        &mut self,
        request: &TransformationRequest,
        metadata: Option<&Table>,
    ) -> Option<&TransformationResult> {
        if !request.is_complete() {
            tracing::debug!("Ignoring incomplete transformation request");
            return None;
        }
        let target = TableSelection::new(request.schema.trim(), request.table.trim());
        tracing::info!(table = %target.qualified_name(), "Processing transformation");

        let planned = self.interpreter.interpret(&request.instruction).and_then(|ops| {
            if let Some(table) = metadata {
                validate_ops(table, &ops)?;
            }
            Ok(ops)
        });

        let result = match planned {
            Ok(ops) => {
                let message = if ops.is_empty() {
                    format!("Transformation accepted for {}", target.qualified_name())
                } else {
                    let steps: Vec<String> = ops.iter().map(ToString::to_string).collect();
                    format!(
                        "Planned {} step(s) for {}: {}",
                        ops.len(),
                        target.qualified_name(),
                        steps.join("; ")
                    )
                };
                self.pending = Some(TransformPlan {
                    target,
                    instruction: request.instruction.trim().to_string(),
                    ops,
                });
                TransformationResult::ok(message)
            }
            Err(e) => {
                tracing::warn!("Transformation rejected: {}", e);
                self.pending = None;
                TransformationResult::failed(e.to_string())
            }
        };
        self.processing_result = Some(result);
        self.processing_result.as_ref()
    }

    /// Take the pending plan for execution
    pub fn commit(&mut self) -> Option<TransformPlan> {
        let plan = self.pending.take()?;
        self.processing_result = Some(TransformationResult::ok(format!(
            "Applied {} step(s) to {}",
            plan.ops.len(),
            plan.target.qualified_name()
        )));
        Some(plan)
    }

    /// Discard the pending plan
    pub fn discard(&mut self) -> Option<TransformPlan> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use rstest::rstest;
    use serde_json::json;

    fn customers() -> Table {
        Table::new(
            "customers",
            vec![
                Column::new("id", "int").primary_key(),
                Column::new("email", "varchar(255)"),
                Column::new("status", "varchar(20)"),
                Column::new("total", "varchar(20)"),
            ],
        )
    }

    #[rstest]
    #[case("rename column email to contact_email", TransformOp::Rename { column: "email".into(), to: "contact_email".into() })]
    #[case("Rename `first name` as first_name", TransformOp::Rename { column: "first name".into(), to: "first_name".into() })]
    #[case("cast total as decimal", TransformOp::Cast { column: "total".into(), to: CastType::Decimal })]
    #[case("convert id to string", TransformOp::Cast { column: "id".into(), to: CastType::Text })]
    #[case("lowercase email", TransformOp::Normalize { column: "email".into(), mode: NormalizeMode::Lowercase })]
    #[case("normalize email to upper", TransformOp::Normalize { column: "email".into(), mode: NormalizeMode::Uppercase })]
    #[case("trim column status", TransformOp::Normalize { column: "status".into(), mode: NormalizeMode::Trim })]
    #[case("filter where status = 'active'", TransformOp::Filter { column: "status".into(), operator: FilterOperator::Eq, value: json!("active") })]
    #[case("keep rows where total >= 100", TransformOp::Filter { column: "total".into(), operator: FilterOperator::Ge, value: json!(100) })]
    #[case("where email contains example", TransformOp::Filter { column: "email".into(), operator: FilterOperator::Contains, value: json!("example") })]
    #[case("drop column status", TransformOp::Drop { column: "status".into() })]
    #[case("fill nulls in status with 'unknown'", TransformOp::FillNull { column: "status".into(), value: json!("unknown") })]
    fn test_interpret_single_step(#[case] instruction: &str, #[case] expected: TransformOp) {
        let ops = KeywordInterpreter.interpret(instruction).unwrap();
        assert_eq!(ops, vec![expected]);
    }

    #[test]
    fn test_interpret_multiple_steps() {
        let ops = KeywordInterpreter
            .interpret("rename email to mail; lowercase mail then drop status.")
            .unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].name(), "rename");
        assert_eq!(ops[1].column(), "mail");
        assert_eq!(ops[2].name(), "drop");
    }

    #[test]
    fn test_separators_inside_quotes_stay_in_the_literal() {
        let ops = KeywordInterpreter
            .interpret("filter where note = 'now then'; fill nulls in status with \"a;b\"")
            .unwrap();
        assert_eq!(
            ops,
            vec![
                TransformOp::Filter {
                    column: "note".into(),
                    operator: FilterOperator::Eq,
                    value: json!("now then"),
                },
                TransformOp::FillNull {
                    column: "status".into(),
                    value: json!("a;b"),
                },
            ]
        );
    }

    #[test]
    fn test_interpret_rejects_unknown_step() {
        let err = KeywordInterpreter
            .interpret("make it faster please")
            .unwrap_err();
        assert!(err.to_string().contains("unrecognised step"));
    }

    #[test]
    fn test_interpret_rejects_unknown_cast_type() {
        assert!(KeywordInterpreter.interpret("cast total as blob").is_err());
    }

    #[test]
    fn test_validate_follows_renames() {
        let ops = KeywordInterpreter
            .interpret("rename email to mail; lowercase mail")
            .unwrap();
        validate_ops(&customers(), &ops).unwrap();

        let ops = KeywordInterpreter
            .interpret("drop email; lowercase email")
            .unwrap();
        let err = validate_ops(&customers(), &ops).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_rejects_rename_collision() {
        let ops = KeywordInterpreter.interpret("rename email to status").unwrap();
        assert!(validate_ops(&customers(), &ops).is_err());
    }

    #[test]
    fn test_empty_instruction_leaves_result_untouched() {
        let mut processor = TransformationProcessor::default();
        processor.process(
            &TransformationRequest::new("drop status", "customers", "shop"),
            None,
        );
        let before = processor.processing_result().cloned();

        let out = processor.process(&TransformationRequest::new("", "customers", "shop"), None);
        assert!(out.is_none());
        assert_eq!(processor.processing_result().cloned(), before);

        let out = processor.process(&TransformationRequest::new("drop x", " ", "shop"), None);
        assert!(out.is_none());
        let out = processor.process(&TransformationRequest::new("drop x", "t", ""), None);
        assert!(out.is_none());
        assert_eq!(processor.processing_result().cloned(), before);
    }

    #[test]
    fn test_process_success_replaces_previous_result() {
        let mut processor = TransformationProcessor::default();
        let table = customers();
        let first = processor
            .process(
                &TransformationRequest::new("drop nope", "customers", "shop"),
                Some(&table),
            )
            .cloned()
            .unwrap();
        assert!(!first.success);
        assert!(processor.pending().is_none());

        let second = processor
            .process(
                &TransformationRequest::new("cast total as decimal", "customers", "shop"),
                Some(&table),
            )
            .cloned()
            .unwrap();
        assert!(second.success);
        assert!(second.message.contains("shop.customers"));
        assert_eq!(processor.processing_result(), Some(&second));
        assert_eq!(processor.pending().unwrap().ops.len(), 1);
    }

    #[test]
    fn test_passthrough_accepts_anything() {
        let mut processor = TransformationProcessor::new(Box::new(PassthroughInterpreter));
        let result = processor
            .process(
                &TransformationRequest::new("whatever you like", "t", "s"),
                None,
            )
            .unwrap();
        assert!(result.success);
        assert!(processor.pending().unwrap().ops.is_empty());
    }

    #[test]
    fn test_commit_takes_pending_plan() {
        let mut processor = TransformationProcessor::default();
        processor.process(&TransformationRequest::new("drop status", "customers", "shop"), None);
        let plan = processor.commit().unwrap();
        assert_eq!(plan.target.qualified_name(), "shop.customers");
        assert!(processor.pending().is_none());
        assert!(processor.commit().is_none());
        assert!(processor.processing_result().unwrap().message.starts_with("Applied"));
    }

    #[test]
    fn test_op_serialization_is_tagged() {
        let op = TransformOp::Cast {
            column: "total".into(),
            to: CastType::Decimal,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json, json!({"op": "cast", "column": "total", "to": "decimal"}));
    }
}
