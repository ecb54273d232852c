//! Permissive wire-string parsing.

use super::encode::decode_component;
use super::filter::{Direction, Filter, Operator, Order};
use super::Query;
use crate::types::Value;
use regex::Regex;
use std::sync::OnceLock;

fn filter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(not\.)?(?:eq\.(.*)|gte\.(.*)|in\.\((.*)\)|lte\.(.*))")
            .expect("filter pattern is valid")
    })
}

fn order_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)\.(asc|desc)$").expect("order pattern is valid"))
}

pub(super) fn parse(raw: &str) -> Query {
    let mut query = Query::default();

    for fragment in raw.split('&') {
        let Some((key, value)) = fragment.split_once('=') else {
            continue;
        };

        match key {
            "limit" => {
                if let Ok(limit) = value.parse() {
                    query.limit = limit;
                }
            }
            "offset" => {
                if let Ok(offset) = value.parse() {
                    query.offset = offset;
                }
            }
            "order" => {
                for term in value.split(',') {
                    if let Some(order) = parse_order(term) {
                        query.order.push(order);
                    }
                }
            }
            _ => {
                if let Some(filter) = parse_filter(key, value) {
                    query.filters.push(filter);
                }
            }
        }
    }

    query
}

fn parse_order(term: &str) -> Option<Order> {
    let caps = order_pattern().captures(term)?;
    let direction = if &caps[2] == "desc" {
        Direction::Desc
    } else {
        Direction::Asc
    };
    Some(Order::new(decode_component(&caps[1]), direction))
}

fn parse_filter(key: &str, value: &str) -> Option<Filter> {
    let caps = filter_pattern().captures(value)?;
    let not = caps.get(1).is_some();

    let (operator, values) = if let Some(m) = caps.get(2) {
        (Operator::Eq, vec![text(m.as_str())])
    } else if let Some(m) = caps.get(3) {
        (Operator::Gte, vec![text(m.as_str())])
    } else if let Some(m) = caps.get(4) {
        (Operator::In, m.as_str().split(',').map(text).collect())
    } else if let Some(m) = caps.get(5) {
        (Operator::Lte, vec![text(m.as_str())])
    } else {
        return None;
    };

    Some(Filter::new(decode_component(key), operator.negate_if(not), values))
}

fn text(raw: &str) -> Value {
    Value::Text(decode_component(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_query() {
        let query = parse(
            "boardId=not.in.(anime,tech)&limit=15&modifiedAt=gte.1534639854746\
             &modifiedAt=lte.1534726254746&offset=30&order=modifiedAt.desc&parentId=eq.",
        );

        assert_eq!(
            query.filters,
            vec![
                Filter::new("boardId", Operator::NotIn, vec!["anime".into(), "tech".into()]),
                Filter::new("modifiedAt", Operator::Gte, vec!["1534639854746".into()]),
                Filter::new("modifiedAt", Operator::Lte, vec!["1534726254746".into()]),
                Filter::new("parentId", Operator::Eq, vec!["".into()]),
            ]
        );
        assert_eq!(query.limit, 15);
        assert_eq!(query.offset, 30);
        assert_eq!(query.order, vec![Order::new("modifiedAt", Direction::Desc)]);
    }

    #[test]
    fn test_unknown_operator_dropped() {
        assert!(parse("foo=bogus.value").filters.is_empty());
        assert!(parse("foo=in.abc").filters.is_empty());
    }

    #[test]
    fn test_malformed_fragments_dropped() {
        let query = parse("&&foo&limit=abc&offset=-3&order=name.sideways,price.asc&a=eq.1");
        assert_eq!(query.limit, 0);
        assert_eq!(query.offset, 0);
        assert_eq!(query.order, vec![Order::new("price", Direction::Asc)]);
        assert_eq!(query.filters.len(), 1);
    }

    #[test]
    fn test_values_decoded() {
        let query = parse("name=in.(a%2Cb,c%20d)&title=not.eq.x%26y");
        assert_eq!(query.filters[0].values, vec![Value::from("a,b"), Value::from("c d")]);
        assert_eq!(query.filters[1].operator, Operator::NotEq);
        assert_eq!(query.filters[1].values, vec![Value::from("x&y")]);
    }

    #[test]
    fn test_value_keeps_equals_sign() {
        let query = parse("expr=eq.a=b");
        assert_eq!(query.filters[0].values, vec![Value::from("a=b")]);
    }

    #[test]
    fn test_empty_string() {
        assert!(parse("").is_empty());
    }
}
