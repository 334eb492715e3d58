//! Console formatting
//!
//! Renders `console.*` arguments the way Node's `util.inspect` does for the
//! common cases: strings print raw at the top level and quoted inside
//! containers, containers nest two levels deep before collapsing.

use rquickjs::{Coerced, Object, Type, Value};

/// Containers deeper than this print as `[Array]` / `[Object]`
const MAX_DEPTH: usize = 2;
/// Array elements shown before the rest are summarized
const MAX_ITEMS: usize = 100;

/// Text for one console argument
pub(crate) fn format_argument(value: &Value<'_>) -> String {
    match value.as_string() {
        Some(s) => s.to_string().unwrap_or_default(),
        None => inspect(value, 0),
    }
}

fn inspect(value: &Value<'_>, depth: usize) -> String {
    match value.type_of() {
        Type::String => quote(&coerce(value)),
        Type::BigInt => format!("{}n", coerce(value)),
        Type::Symbol => "Symbol()".to_string(),
        Type::Function | Type::Constructor => match value.as_object().map(name_of) {
            Some(name) if !name.is_empty() => format!("[Function: {name}]"),
            _ => "[Function (anonymous)]".to_string(),
        },
        Type::Exception => value.as_object().map_or_else(String::new, error_summary),
        Type::Array => match value.as_array() {
            Some(_) if depth > MAX_DEPTH => "[Array]".to_string(),
            Some(array) => {
                let mut items: Vec<String> = array
                    .iter::<Value>()
                    .take(MAX_ITEMS)
                    .map(|item| item.map_or_else(|_| "?".to_string(), |item| inspect(&item, depth + 1)))
                    .collect();
                if array.len() > MAX_ITEMS {
                    items.push(format!("... {} more items", array.len() - MAX_ITEMS));
                }
                bracketed('[', items, ']')
            }
            None => coerce(value),
        },
        Type::Object | Type::Proxy | Type::Promise => match value.as_object() {
            Some(object) => inspect_object(object, depth),
            None => coerce(value),
        },
        _ => coerce(value),
    }
}

fn inspect_object(object: &Object<'_>, depth: usize) -> String {
    let prefix = object
        .get::<_, Option<Object>>("constructor")
        .ok()
        .flatten()
        .map(|constructor| name_of(&constructor))
        .filter(|name| !name.is_empty() && name != "Object")
        .map(|name| format!("{name} "))
        .unwrap_or_default();
    if depth > MAX_DEPTH {
        let name = prefix.trim_end();
        return if name.is_empty() { "[Object]".to_string() } else { format!("[{name}]") };
    }

    let entries: Vec<String> = object
        .keys::<String>()
        .filter_map(Result::ok)
        .map(|key| {
            let shown = object
                .get::<_, Value>(key.as_str())
                .map_or_else(|_| "?".to_string(), |value| inspect(&value, depth + 1));
            format!("{}: {shown}", property_key(&key))
        })
        .collect();
    format!("{prefix}{}", bracketed('{', entries, '}'))
}

fn bracketed(open: char, items: Vec<String>, close: char) -> String {
    if items.is_empty() {
        format!("{open}{close}")
    } else {
        format!("{open} {} {close}", items.join(", "))
    }
}

fn error_summary(error: &Object<'_>) -> String {
    let name = error
        .get::<_, Option<Coerced<String>>>("name")
        .ok()
        .flatten()
        .map_or_else(|| "Error".to_string(), |n| n.0);
    match error.get::<_, Option<Coerced<String>>>("message").ok().flatten() {
        Some(message) if !message.0.is_empty() => format!("{name}: {}", message.0),
        _ => name,
    }
}

fn name_of(object: &Object<'_>) -> String {
    object
        .get::<_, Option<Coerced<String>>>("name")
        .ok()
        .flatten()
        .map(|n| n.0)
        .unwrap_or_default()
}

fn coerce(value: &Value<'_>) -> String {
    value.get::<Coerced<String>>().map(|c| c.0).unwrap_or_default()
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n"))
}

fn property_key(key: &str) -> String {
    let mut chars = key.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if identifier { key.to_string() } else { quote(key) }
}
