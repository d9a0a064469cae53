#[cfg(test)]
#[path = "query_test.rs"]
mod tests;

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::DocumentSnapshot;

/// A single document addressed by collection path and id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: &str, id: &str) -> DocumentRef {
        return DocumentRef {
            collection: collection.to_string(),
            id: id.to_string(),
        };
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        return write!(f, "{}/{}", self.collection, self.id);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum FilterOp {
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn matches(&self, data: &Value) -> bool {
        let field = lookup(data, &self.field);
        match self.op {
            FilterOp::Equal => return field == Some(&self.value),
            FilterOp::NotEqual => return field.is_some() && field != Some(&self.value),
        }
    }
}

/// Filtered and ordered view over a collection. Built up constraint by
/// constraint, then handed to a `RemoteStore` to listen on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: &str) -> Query {
        return Query {
            collection: collection.to_string(),
            filters: vec![],
            order_by: vec![],
            limit: None,
        };
    }

    pub fn where_eq(self, field: &str, value: Value) -> Query {
        return self.filter(field, FilterOp::Equal, value);
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: Value) -> Query {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value,
        });
        return self;
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Query {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        return self;
    }

    pub fn limit(mut self, limit: usize) -> Query {
        self.limit = Some(limit);
        return self;
    }

    /// Evaluates the constraints over a full collection. Documents missing a
    /// field used for ordering are left out of the result.
    pub fn apply(&self, docs: Vec<DocumentSnapshot>) -> Vec<DocumentSnapshot> {
        let mut res = docs
            .into_iter()
            .filter(|doc| {
                let data = match &doc.data {
                    Some(data) => data,
                    None => return false,
                };

                return self.filters.iter().all(|e| return e.matches(data))
                    && self
                        .order_by
                        .iter()
                        .all(|e| return lookup(data, &e.field).is_some());
            })
            .collect::<Vec<DocumentSnapshot>>();

        res.sort_by(|a, b| {
            for order in &self.order_by {
                let left = a.data.as_ref().and_then(|e| return lookup(e, &order.field));
                let right = b.data.as_ref().and_then(|e| return lookup(e, &order.field));
                let mut ordering = compare_values(left, right);
                if order.direction == Direction::Desc {
                    ordering = ordering.reverse();
                }
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }

            return a.id.cmp(&b.id);
        });

        if let Some(limit) = self.limit {
            res.truncate(limit);
        }

        return res;
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        for filter in &self.filters {
            write!(f, " where {} {} {}", filter.field, filter.op, filter.value)?;
        }
        for order in &self.order_by {
            write!(f, " order by {} {}", order.field, order.direction)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }

        return Ok(());
    }
}

/// Resolves a dotted field path such as `metadata.title`.
fn lookup<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = data;
    for key in field.split('.') {
        current = current.get(key)?;
    }

    if current.is_null() {
        return None;
    }

    return Some(current);
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => return 0,
        Value::Bool(_) => return 1,
        Value::Number(_) => return 2,
        Value::String(_) => return 3,
        Value::Array(_) => return 4,
        Value::Object(_) => return 5,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let (left, right) = match (left, right) {
        (Some(left), Some(right)) => (left, right),
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
    };

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => return a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        (Value::String(a), Value::String(b)) => return a.cmp(b),
        _ => return type_rank(left).cmp(&type_rank(right)),
    }
}
