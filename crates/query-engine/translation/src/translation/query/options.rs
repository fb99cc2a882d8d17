//! The query options of a request, parsed but not yet checked against the entity model.

use super::filtering::{self, Filter};
use super::grouping;
use super::sorting::{self, OrderByItem};
use crate::translation::error::Error;

/// Whether to include the total count alongside the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlineCount {
    #[default]
    None,
    AllPages,
}

/// Parsed query options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOptions {
    pub filter: Option<Filter>,
    /// `None` selects every property.
    pub select: Option<Vec<String>>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
    pub order_by: Vec<OrderByItem>,
    pub inline_count: InlineCount,
    pub skip_token: Option<String>,
    /// Property names listed by `apply=groupby(…)`.
    pub group_by: Option<Vec<String>>,
}

impl QueryOptions {
    /// Parse decoded query string pairs. Options this layer does not handle, such as
    /// `$format`, are ignored.
    pub fn parse<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<QueryOptions, Error> {
        let mut options = QueryOptions::default();
        for (name, value) in pairs {
            match name {
                "$filter" => options.filter = Some(filtering::parse_filter(value)?),
                "$select" => options.select = parse_select(value),
                "$top" => options.top = Some(parse_count(name, value)?),
                "$skip" => options.skip = Some(parse_count(name, value)?),
                "$orderby" => options.order_by = sorting::parse_order_by(value)?,
                "$inlinecount" => {
                    options.inline_count = match value {
                        "allpages" => InlineCount::AllPages,
                        "none" => InlineCount::None,
                        _ => return Err(invalid(name, value)),
                    }
                }
                "$skiptoken" => options.skip_token = Some(value.to_string()),
                "apply" | "$apply" => options.group_by = Some(grouping::parse_apply(value)?),
                _ => {}
            }
        }
        Ok(options)
    }
}

fn invalid(name: &str, value: &str) -> Error {
    Error::InvalidOptionValue {
        option: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_count(name: &str, value: &str) -> Result<u32, Error> {
    value.trim().parse::<u32>().map_err(|_| invalid(name, value))
}

/// `*` anywhere in the list selects everything.
fn parse_select(value: &str) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() || items.iter().any(|item| item == "*") {
        None
    } else {
        Some(items)
    }
}
