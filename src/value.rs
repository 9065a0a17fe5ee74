use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, Months, SecondsFormat, TimeDelta};
use indexmap::IndexMap;

use crate::error::PropertyError;
use crate::types::ValueType;

/// A runtime value produced by evaluating an expression.
///
/// `Null` plays the role of an absent value: failed evaluations, missing
/// fields and unbound variables all evaluate to it.
///
/// # Examples
///
/// ```
/// use pipeline_rules::Value;
///
/// let long = Value::Long(42);
/// let text = Value::from("hello");
/// let list = Value::List(vec![Value::Long(1), Value::Long(2)]);
///
/// assert_eq!(long.to_string(), "42");
/// assert_eq!(text.as_str(), Some("hello"));
/// assert_eq!(list.to_string(), "[1, 2]");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    Null,

    Boolean(bool),

    /// 64-bit signed integer
    Long(i64),

    /// 64-bit floating point number
    Double(f64),

    String(String),

    /// Instant with the offset it was created in
    DateTime(DateTime<FixedOffset>),

    /// Calendar based amount of time (years, months, ...)
    Period(Period),

    /// Exact elapsed time between two instants
    Duration(TimeDelta),

    List(Vec<Value>),

    /// Insertion ordered map with string keys
    Map(IndexMap<String, Value>),

    /// Host object exposing named properties
    Object(Arc<dyn PropertyAccess>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::of(self)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral view; only `Long` values qualify.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Floating view of any numeric value.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Long(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            // NaN equals NaN, 0.0 differs from -0.0
            (Value::Double(a), Value::Double(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            (Value::String(a), Value::String(b)) => a == b,
            // chrono compares the instants, not the offsets
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Period(a), Value::Period(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Period(p) => write!(f, "{}", p),
            Value::Duration(d) => write_duration(f, d),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Object(object) => write!(f, "{:?}", object),
        }
    }
}

fn write_duration(f: &mut fmt::Formatter<'_>, duration: &TimeDelta) -> fmt::Result {
    let millis = duration.num_milliseconds();
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    if millis % 1000 == 0 {
        write!(f, "PT{}{}S", sign, millis / 1000)
    } else {
        write!(f, "PT{}{}.{:03}S", sign, millis / 1000, millis % 1000)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Period> for Value {
    fn from(p: Period) -> Self {
        Value::Period(p)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A value bound to a variable, together with the static type it was declared with.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub ty: ValueType,
    pub value: Value,
}

impl TypedValue {
    pub fn new(ty: ValueType, value: Value) -> Self {
        TypedValue { ty, value }
    }
}

/// Capability of host objects that can be read through field access (`obj.name`).
///
/// Implementors return `Ok(None)` for unknown properties; the interpreter then
/// retries with the lowerCamelCase spelling of a lower_snake_case name.
pub trait PropertyAccess: fmt::Debug + Send + Sync {
    fn property(&self, name: &str) -> Result<Option<Value>, PropertyError>;
}

/// A calendar period, field by field like ISO-8601 `PnYnMnWnDTnHnMnS`.
///
/// Fields are kept separately: one month is not thirty days and adding a
/// period to a date respects month lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Period {
    pub years: i32,
    pub months: i32,
    pub weeks: i32,
    pub days: i32,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
    pub millis: i32,
}

impl Period {
    pub fn years(n: i32) -> Self {
        Period { years: n, ..Default::default() }
    }

    pub fn months(n: i32) -> Self {
        Period { months: n, ..Default::default() }
    }

    pub fn weeks(n: i32) -> Self {
        Period { weeks: n, ..Default::default() }
    }

    pub fn days(n: i32) -> Self {
        Period { days: n, ..Default::default() }
    }

    pub fn hours(n: i32) -> Self {
        Period { hours: n, ..Default::default() }
    }

    pub fn minutes(n: i32) -> Self {
        Period { minutes: n, ..Default::default() }
    }

    pub fn seconds(n: i32) -> Self {
        Period { seconds: n, ..Default::default() }
    }

    pub fn millis(n: i32) -> Self {
        Period { millis: n, ..Default::default() }
    }

    fn zip_with(&self, other: &Period, op: fn(i32, i32) -> Option<i32>) -> Option<Period> {
        Some(Period {
            years: op(self.years, other.years)?,
            months: op(self.months, other.months)?,
            weeks: op(self.weeks, other.weeks)?,
            days: op(self.days, other.days)?,
            hours: op(self.hours, other.hours)?,
            minutes: op(self.minutes, other.minutes)?,
            seconds: op(self.seconds, other.seconds)?,
            millis: op(self.millis, other.millis)?,
        })
    }

    /// Field-wise sum, `None` on overflow.
    pub fn checked_plus(&self, other: &Period) -> Option<Period> {
        self.zip_with(other, i32::checked_add)
    }

    /// Field-wise difference, `None` on overflow.
    pub fn checked_minus(&self, other: &Period) -> Option<Period> {
        self.zip_with(other, i32::checked_sub)
    }

    pub fn checked_neg(&self) -> Option<Period> {
        Period::default().checked_minus(self)
    }

    /// Shifts `dt` by this period, largest field first.
    pub fn add_to(&self, dt: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let dt = shift_months(dt, i64::from(self.years) * 12)?;
        let dt = shift_months(dt, i64::from(self.months))?;
        let dt = shift_days(dt, i64::from(self.weeks) * 7)?;
        let dt = shift_days(dt, i64::from(self.days))?;
        let delta = TimeDelta::hours(i64::from(self.hours))
            + TimeDelta::minutes(i64::from(self.minutes))
            + TimeDelta::seconds(i64::from(self.seconds))
            + TimeDelta::milliseconds(i64::from(self.millis));
        dt.checked_add_signed(delta)
    }

    pub fn subtract_from(&self, dt: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        self.checked_neg()?.add_to(dt)
    }
}

fn shift_months(dt: DateTime<FixedOffset>, months: i64) -> Option<DateTime<FixedOffset>> {
    let amount = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(amount)
    } else {
        dt.checked_sub_months(amount)
    }
}

fn shift_days(dt: DateTime<FixedOffset>, days: i64) -> Option<DateTime<FixedOffset>> {
    let amount = Days::new(days.unsigned_abs());
    if days >= 0 {
        dt.checked_add_days(amount)
    } else {
        dt.checked_sub_days(amount)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        for (amount, unit) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if amount != 0 {
                write!(f, "{}{}", amount, unit)?;
            }
        }

        let total_millis = i64::from(self.seconds) * 1000 + i64::from(self.millis);
        if self.hours == 0 && self.minutes == 0 && total_millis == 0 {
            if *self == Period::default() {
                write!(f, "T0S")?;
            }
            return Ok(());
        }

        write!(f, "T")?;
        if self.hours != 0 {
            write!(f, "{}H", self.hours)?;
        }
        if self.minutes != 0 {
            write!(f, "{}M", self.minutes)?;
        }
        if total_millis != 0 {
            let sign = if total_millis < 0 { "-" } else { "" };
            let abs = total_millis.unsigned_abs();
            if abs % 1000 == 0 {
                write!(f, "{}{}S", sign, abs / 1000)?;
            } else {
                write!(f, "{}{}.{:03}S", sign, abs / 1000, abs % 1000)?;
            }
        }
        Ok(())
    }
}
