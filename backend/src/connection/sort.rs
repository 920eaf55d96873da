//! Unique sort tiebreak

use super::args::OrderBy;
use crate::model::EntityDescriptor;

/// Make `order_by` reference a unique attribute so every row has a stable position.
///
/// Requested entries are kept verbatim. When none of them is unique the primary
/// attribute is appended ascending. Entities without a primary attribute are left
/// unchanged.
pub fn force_sort_by_unique(order_by: &mut Vec<OrderBy>, entity: &EntityDescriptor) {
    let has_unique = order_by.iter().any(|order| {
        entity
            .attribute(&order.attribute)
            .is_some_and(|attribute| attribute.unique)
    });
    if has_unique {
        return;
    }

    if let Some(primary) = entity.primary_attribute() {
        order_by.push(OrderBy::asc(primary.name.clone()));
    }
}

/// Order handed to storage: `order_by` followed by the primary attribute unless
/// already present. Unique columns may hold several `NULL`s, so ties always break
/// on the primary.
pub fn keyset_order(order_by: &[OrderBy], entity: &EntityDescriptor) -> Vec<OrderBy> {
    let mut keyset = order_by.to_vec();
    if let Some(primary) = entity.primary_attribute() {
        if !keyset.iter().any(|order| order.attribute == primary.name) {
            keyset.push(OrderBy::asc(primary.name.clone()));
        }
    }
    keyset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeDescriptor;

    fn book() -> EntityDescriptor {
        EntityDescriptor::builder("Book")
            .attribute(AttributeDescriptor::id("id").primary())
            .attribute(AttributeDescriptor::string("isbn").unique())
            .attribute(AttributeDescriptor::string("title"))
            .attribute(AttributeDescriptor::integer("year"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_order_gets_primary() {
        let mut order_by = Vec::new();
        force_sort_by_unique(&mut order_by, &book());
        assert_eq!(order_by, vec![OrderBy::asc("id")]);
    }

    #[test]
    fn test_non_unique_order_gets_primary_appended() {
        let mut order_by = vec![OrderBy::desc("year"), OrderBy::asc("title")];
        force_sort_by_unique(&mut order_by, &book());
        assert_eq!(
            order_by,
            vec![OrderBy::desc("year"), OrderBy::asc("title"), OrderBy::asc("id")]
        );
    }

    #[test]
    fn test_unique_order_is_kept() {
        let mut order_by = vec![OrderBy::desc("year"), OrderBy::desc("isbn")];
        force_sort_by_unique(&mut order_by, &book());
        assert_eq!(order_by, vec![OrderBy::desc("year"), OrderBy::desc("isbn")]);
    }

    #[test]
    fn test_entries_after_unique_are_kept() {
        let mut order_by = vec![OrderBy::asc("isbn"), OrderBy::asc("title")];
        force_sort_by_unique(&mut order_by, &book());
        assert_eq!(order_by, vec![OrderBy::asc("isbn"), OrderBy::asc("title")]);
    }

    #[test]
    fn test_keyset_order_ends_in_primary() {
        let entity = book();
        assert_eq!(
            keyset_order(&[OrderBy::asc("isbn"), OrderBy::asc("title")], &entity),
            vec![OrderBy::asc("isbn"), OrderBy::asc("title"), OrderBy::asc("id")]
        );
        assert_eq!(
            keyset_order(&[OrderBy::desc("id"), OrderBy::asc("title")], &entity),
            vec![OrderBy::desc("id"), OrderBy::asc("title")]
        );
    }
}
