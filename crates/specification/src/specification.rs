//! Specification: an immutable, composable predicate over an entity type.
//!
//! A `Specification<T>` is a small tree. Leaves are either opaque predicates
//! (closures supplied by the caller) or structural criteria built from a
//! [`Filter`]; inner nodes are AND / OR / NOT. Composition never touches its
//! operands: `a.and(&b)` allocates one new node that shares `a` and `b`.
//!
//! ## Evaluation
//!
//! `is_satisfied_by` walks the tree and short-circuits exactly like `&&` and
//! `||`: the right operand of an AND is never evaluated when the left one is
//! false, so a failing right-hand predicate cannot surface in that case.
//! Errors raised while evaluating a leaf are returned unchanged.
//!
//! ## Translation
//!
//! When every leaf is structural, [`Specification::to_filter`] returns the
//! equivalent [`Filter`], which store adapters turn into native queries.
//! Opaque leaves can only be evaluated in memory.
//!
//! ## Sharing
//!
//! Nodes hold no entity data and no interior mutability, so a specification is
//! `Send + Sync` for every `T` and can be reused concurrently without locking.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{EvaluationError, SpecificationError};
use crate::filter::{Criterion, Filter};
use crate::value::Record;

type PredicateFn<T> = Box<dyn Fn(&T) -> Result<bool, EvaluationError> + Send + Sync>;

enum Node<T> {
    Constant(bool),
    Predicate { name: String, eval: PredicateFn<T> },
    Criterion { criterion: Criterion, eval: PredicateFn<T> },
    And(Specification<T>, Specification<T>),
    Or(Specification<T>, Specification<T>),
    Not(Specification<T>),
}

/// Immutable predicate over `T`, composable with AND / OR / NOT.
pub struct Specification<T> {
    node: Arc<Node<T>>,
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T> Specification<T> {
    fn from_node(node: Node<T>) -> Self {
        Self { node: Arc::new(node) }
    }

    /// Opaque specification from an infallible predicate.
    ///
    /// `name` is only used when rendering the specification (logs, errors).
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_node(Node::Predicate {
            name: name.into(),
            eval: Box::new(move |entity| Ok(predicate(entity))),
        })
    }

    /// Opaque specification from a predicate that may fail on some entities.
    pub fn try_new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> Result<bool, EvaluationError> + Send + Sync + 'static,
    {
        Self::from_node(Node::Predicate {
            name: name.into(),
            eval: Box::new(predicate),
        })
    }

    /// Satisfied by every entity.
    pub fn all() -> Self {
        Self::from_node(Node::Constant(true))
    }

    /// Satisfied by no entity.
    pub fn none() -> Self {
        Self::from_node(Node::Constant(false))
    }

    pub fn is_satisfied_by(&self, entity: &T) -> Result<bool, EvaluationError> {
        match &*self.node {
            Node::Constant(b) => Ok(*b),
            Node::Predicate { eval, .. } | Node::Criterion { eval, .. } => eval(entity),
            Node::And(a, b) => Ok(a.is_satisfied_by(entity)? && b.is_satisfied_by(entity)?),
            Node::Or(a, b) => Ok(a.is_satisfied_by(entity)? || b.is_satisfied_by(entity)?),
            Node::Not(inner) => Ok(!inner.is_satisfied_by(entity)?),
        }
    }

    pub fn and(&self, other: &Specification<T>) -> Specification<T> {
        Self::from_node(Node::And(self.clone(), other.clone()))
    }

    pub fn or(&self, other: &Specification<T>) -> Specification<T> {
        Self::from_node(Node::Or(self.clone(), other.clone()))
    }

    pub fn not(&self) -> Specification<T> {
        Self::from_node(Node::Not(self.clone()))
    }

    /// `self AND NOT other`.
    pub fn and_not(&self, other: &Specification<T>) -> Specification<T> {
        self.and(&other.not())
    }

    /// Keep the items that satisfy the specification, preserving order.
    ///
    /// Stops at the first evaluation error.
    pub fn select<I>(&self, items: I) -> Result<Vec<T>, EvaluationError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut out = Vec::new();
        for item in items {
            if self.is_satisfied_by(&item)? {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Like [`select`](Self::select) but over borrowed items.
    pub fn select_refs<'a, I>(&self, items: I) -> Result<Vec<&'a T>, EvaluationError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut out = Vec::new();
        for item in items {
            if self.is_satisfied_by(item)? {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Structural form of the whole tree, or `None` if any leaf is opaque.
    pub fn to_filter(&self) -> Option<Filter> {
        match &*self.node {
            Node::Constant(b) => Some(Filter::Always(*b)),
            Node::Predicate { .. } => None,
            Node::Criterion { criterion, .. } => Some(Filter::Where(criterion.clone())),
            Node::And(a, b) => Some(a.to_filter()?.and(b.to_filter()?)),
            Node::Or(a, b) => Some(a.to_filter()?.or(b.to_filter()?)),
            Node::Not(inner) => Some(inner.to_filter()?.negate()),
        }
    }

    /// True when the tree can be handed to a store as a [`Filter`].
    pub fn is_translatable(&self) -> bool {
        self.to_filter().is_some()
    }
}

impl<T: Record + 'static> Specification<T> {
    /// Structural specification from a single criterion.
    pub fn from_criterion(criterion: Criterion) -> Result<Self, SpecificationError> {
        criterion.validate()?;
        let evaluated = criterion.clone();
        Ok(Self::from_node(Node::Criterion {
            criterion,
            eval: Box::new(move |entity: &T| evaluated.evaluate(entity)),
        }))
    }

    /// Structural specification from a filter tree.
    ///
    /// Fails with `InvalidArgument` if any criterion is malformed.
    pub fn from_filter(filter: Filter) -> Result<Self, SpecificationError> {
        match filter {
            Filter::Always(true) => Ok(Self::all()),
            Filter::Always(false) => Ok(Self::none()),
            Filter::Where(c) => Self::from_criterion(c),
            Filter::And(a, b) => Ok(Self::from_filter(*a)?.and(&Self::from_filter(*b)?)),
            Filter::Or(a, b) => Ok(Self::from_filter(*a)?.or(&Self::from_filter(*b)?)),
            Filter::Not(inner) => Ok(Self::from_filter(*inner)?.not()),
        }
    }

    /// Parse a serialized filter.
    ///
    /// A `null` document means the predicate is absent and fails with
    /// `InvalidArgument`, as does anything that is not a well-formed filter.
    pub fn from_json(value: &JsonValue) -> Result<Self, SpecificationError> {
        if value.is_null() {
            return Err(SpecificationError::invalid_argument("predicate is absent"));
        }
        let filter: Filter = serde_json::from_value(value.clone())
            .map_err(|e| SpecificationError::invalid_argument(format!("malformed filter: {e}")))?;
        Self::from_filter(filter)
    }
}

impl<T: Record + 'static> TryFrom<Filter> for Specification<T> {
    type Error = SpecificationError;

    fn try_from(value: Filter) -> Result<Self, Self::Error> {
        Self::from_filter(value)
    }
}

impl<T: Record + 'static> TryFrom<Criterion> for Specification<T> {
    type Error = SpecificationError;

    fn try_from(value: Criterion) -> Result<Self, Self::Error> {
        Self::from_criterion(value)
    }
}

impl<T> core::fmt::Display for Specification<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &*self.node {
            Node::Constant(true) => f.write_str("TRUE"),
            Node::Constant(false) => f.write_str("FALSE"),
            Node::Predicate { name, .. } if name.is_empty() => f.write_str("<predicate>"),
            Node::Predicate { name, .. } => f.write_str(name),
            Node::Criterion { criterion, .. } => write!(f, "{criterion}"),
            Node::And(a, b) => write!(f, "({a} AND {b})"),
            Node::Or(a, b) => write!(f, "({a} OR {b})"),
            Node::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

impl<T> core::fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Specification").field(&format_args!("{self}")).finish()
    }
}

impl<T> core::ops::BitAnd for Specification<T> {
    type Output = Specification<T>;

    fn bitand(self, rhs: Self) -> Self::Output {
        Specification::from_node(Node::And(self, rhs))
    }
}

impl<T> core::ops::BitOr for Specification<T> {
    type Output = Specification<T>;

    fn bitor(self, rhs: Self) -> Self::Output {
        Specification::from_node(Node::Or(self, rhs))
    }
}

impl<T> core::ops::Not for Specification<T> {
    type Output = Specification<T>;

    fn not(self) -> Self::Output {
        Specification::from_node(Node::Not(self))
    }
}

impl<T> core::ops::BitAnd for &Specification<T> {
    type Output = Specification<T>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl<T> core::ops::BitOr for &Specification<T> {
    type Output = Specification<T>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl<T> core::ops::Not for &Specification<T> {
    type Output = Specification<T>;

    fn not(self) -> Self::Output {
        Specification::not(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Customer {
        first_name: String,
        zip_code: String,
    }

    impl Record for Customer {
        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "first_name" => Some(self.first_name.clone().into()),
                "zip_code" => Some(self.zip_code.clone().into()),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Timesheet {
        period: i32,
        employee_id: String,
    }

    impl Record for Timesheet {
        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "period" => Some(self.period.into()),
                "employee_id" => Some(self.employee_id.clone().into()),
                _ => None,
            }
        }
    }

    fn customer(zip: &str) -> Customer {
        Customer {
            first_name: "Ada".into(),
            zip_code: zip.into(),
        }
    }

    #[test]
    fn opaque_predicate_rejects_matching_zip() {
        let outside = Specification::new("zip_code != 30062", |c: &Customer| c.zip_code != "30062");
        assert!(!outside.is_satisfied_by(&customer("30062")).unwrap());
        assert!(outside.is_satisfied_by(&customer("10001")).unwrap());
    }

    #[test]
    fn structural_predicate_rejects_matching_zip() {
        let outside = Specification::<Customer>::from_criterion(Criterion::ne("zip_code", "30062")).unwrap();
        assert!(!outside.is_satisfied_by(&customer("30062")).unwrap());
    }

    #[test]
    fn and_requires_both_sides() {
        let period = Specification::<Timesheet>::from_criterion(Criterion::eq("period", 2024)).unwrap();
        let employee = Specification::<Timesheet>::from_criterion(Criterion::eq("employee_id", "U1")).unwrap();
        let both = period.and(&employee);

        let current = Timesheet { period: 2024, employee_id: "U1".into() };
        let previous = Timesheet { period: 2023, employee_id: "U1".into() };
        assert!(both.is_satisfied_by(&current).unwrap());
        assert!(!both.is_satisfied_by(&previous).unwrap());
    }

    #[test]
    fn a_or_not_a_is_a_tautology() {
        let a = Specification::new("zip 30062", |c: &Customer| c.zip_code == "30062");
        let always = a.or(&a.not());
        for zip in ["30062", "10001", ""] {
            assert!(always.is_satisfied_by(&customer(zip)).unwrap());
        }
    }

    #[test]
    fn composition_leaves_operands_untouched() {
        let a = Specification::new("A", |c: &Customer| c.zip_code == "30062");
        let b = Specification::new("B", |c: &Customer| c.first_name == "Ada");
        let _combined = a.and(&b).or(&a.not());
        assert_eq!(a.to_string(), "A");
        assert_eq!(b.to_string(), "B");
    }

    #[test]
    fn and_short_circuits_the_right_operand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            Specification::try_new("boom", move |_: &Customer| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EvaluationError::predicate("boom"))
            })
        };

        let spec = Specification::none().and(&counted);
        assert!(!spec.is_satisfied_by(&customer("30062")).unwrap());

        let spec = Specification::all().or(&counted);
        assert!(spec.is_satisfied_by(&customer("30062")).unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn evaluation_errors_propagate_unchanged() {
        let failing = Specification::try_new("needs zip", |c: &Customer| {
            if c.zip_code.is_empty() {
                Err(EvaluationError::predicate("zip code missing"))
            } else {
                Ok(true)
            }
        });
        let spec = Specification::all().and(&failing);
        assert_eq!(
            spec.is_satisfied_by(&customer("")).unwrap_err(),
            EvaluationError::predicate("zip code missing")
        );
    }

    #[test]
    fn unknown_field_surfaces_at_evaluation() {
        let spec = Specification::<Customer>::from_criterion(Criterion::eq("age", 30)).unwrap();
        assert_eq!(
            spec.is_satisfied_by(&customer("30062")).unwrap_err(),
            EvaluationError::UnknownField("age".into())
        );
    }

    #[test]
    fn absent_predicate_is_invalid_argument() {
        let err = Specification::<Customer>::from_json(&JsonValue::Null).unwrap_err();
        assert!(matches!(err, SpecificationError::InvalidArgument(_)));

        let err = Specification::<Customer>::from_json(&json!({ "where": { "field": "zip_code", "op": "eq" } }))
            .unwrap_err();
        assert!(matches!(err, SpecificationError::InvalidArgument(_)));
    }

    #[test]
    fn from_json_builds_a_working_specification() {
        let spec = Specification::<Timesheet>::from_json(&json!({
            "and": [
                { "where": { "field": "period", "op": "eq", "value": 2024 } },
                { "not": { "where": { "field": "employee_id", "op": "eq", "value": "U2" } } }
            ]
        }))
        .unwrap();

        assert!(spec.is_satisfied_by(&Timesheet { period: 2024, employee_id: "U1".into() }).unwrap());
        assert!(!spec.is_satisfied_by(&Timesheet { period: 2024, employee_id: "U2".into() }).unwrap());
    }

    #[test]
    fn uuid_shaped_text_operands_do_not_fail_text_fields() {
        let spec = Specification::<Timesheet>::from_json(&json!({
            "where": { "field": "employee_id", "op": "eq", "value": "550e8400-e29b-41d4-a716-446655440000" }
        }))
        .unwrap();
        let sheet = Timesheet { period: 2024, employee_id: "U1".into() };

        assert!(!spec.is_satisfied_by(&sheet).unwrap());
        assert!(spec.not().is_satisfied_by(&sheet).unwrap());

        let matching = Timesheet {
            period: 2024,
            employee_id: "550e8400-e29b-41d4-a716-446655440000".into(),
        };
        assert!(spec.is_satisfied_by(&matching).unwrap());
    }

    #[test]
    fn to_filter_round_trips_structural_trees() {
        let filter = Filter::from(Criterion::eq("period", 2024)).and(Criterion::eq("employee_id", "U1").into()).negate();
        let spec = Specification::<Timesheet>::from_filter(filter.clone()).unwrap();
        assert_eq!(spec.to_filter(), Some(filter));
    }

    #[test]
    fn opaque_leaves_are_not_translatable() {
        let structural = Specification::<Customer>::from_criterion(Criterion::eq("zip_code", "30062")).unwrap();
        let opaque = Specification::new("vip", |_: &Customer| true);
        assert!(structural.is_translatable());
        assert!(!structural.and(&opaque).is_translatable());
    }

    #[test]
    fn display_renders_the_tree() {
        let zip = Specification::<Customer>::from_criterion(Criterion::ne("zip_code", "30062")).unwrap();
        let vip = Specification::new("is_vip", |_: &Customer| false);
        assert_eq!(zip.and_not(&vip).to_string(), r#"(zip_code != "30062" AND NOT is_vip)"#);
    }

    #[test]
    fn operators_mirror_methods() {
        let a = Specification::new("A", |c: &Customer| c.zip_code == "30062");
        let b = Specification::new("B", |c: &Customer| c.first_name == "Ada");
        let by_ref = &a & &b;
        let by_value = !(a.clone() | b.clone());
        assert_eq!(by_ref.to_string(), "(A AND B)");
        assert_eq!(by_value.to_string(), "NOT (A OR B)");
    }

    #[test]
    fn select_keeps_matching_items_in_order() {
        let spec = Specification::new("not 30062", |c: &Customer| c.zip_code != "30062");
        let items = vec![customer("1"), customer("30062"), customer("2")];
        let kept = spec.select(items).unwrap();
        assert_eq!(kept, vec![customer("1"), customer("2")]);
    }

    #[test]
    fn specifications_are_shareable_across_threads() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Specification<Customer>>();

        let spec = Specification::new("zip", |c: &Customer| c.zip_code == "30062");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let spec = spec.clone();
                std::thread::spawn(move || spec.is_satisfied_by(&customer("30062")).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    fn leaf(bit: u8) -> Specification<u8> {
        Specification::new(format!("bit{bit}"), move |v: &u8| v & (1 << bit) != 0)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: AND / OR / NOT agree with the boolean operators on their operands.
        #[test]
        fn composition_matches_boolean_logic(x in any::<u8>(), i in 0u8..8, j in 0u8..8) {
            let (a, b) = (leaf(i), leaf(j));
            let ea = a.is_satisfied_by(&x).unwrap();
            let eb = b.is_satisfied_by(&x).unwrap();

            prop_assert_eq!(a.and(&b).is_satisfied_by(&x).unwrap(), ea && eb);
            prop_assert_eq!(a.or(&b).is_satisfied_by(&x).unwrap(), ea || eb);
            prop_assert_eq!(a.not().is_satisfied_by(&x).unwrap(), !ea);
            prop_assert_eq!(a.not().not().is_satisfied_by(&x).unwrap(), ea);
            prop_assert!(a.or(&a.not()).is_satisfied_by(&x).unwrap());
        }

        /// Property: AND and OR are associative.
        #[test]
        fn composition_is_associative(x in any::<u8>(), i in 0u8..8, j in 0u8..8, k in 0u8..8) {
            let (a, b, c) = (leaf(i), leaf(j), leaf(k));

            prop_assert_eq!(
                a.and(&b).and(&c).is_satisfied_by(&x).unwrap(),
                a.and(&b.and(&c)).is_satisfied_by(&x).unwrap()
            );
            prop_assert_eq!(
                a.or(&b).or(&c).is_satisfied_by(&x).unwrap(),
                a.or(&b.or(&c)).is_satisfied_by(&x).unwrap()
            );
        }
    }
}
