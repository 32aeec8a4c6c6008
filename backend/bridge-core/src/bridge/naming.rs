//! Wire naming rules shared by binders, proxies and stubs.

/// `get_user` and `GetUser` both become `getUser`.
pub fn to_camel_case(name: &str) -> String {
    let mut camel = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !camel.is_empty();
            continue;
        }
        if camel.is_empty() {
            camel.extend(c.to_lowercase());
        } else if upper_next {
            camel.extend(c.to_uppercase());
        } else {
            camel.push(c);
        }
        upper_next = false;
    }
    camel
}

/// Service name for an interface: the custom name when given, otherwise the
/// type name with a leading `I` dropped when it precedes an uppercase letter
/// (`IGreeter` → `Greeter`, `Inventory` stays).
pub fn service_name(type_name: &str, custom: Option<&str>) -> String {
    if let Some(custom) = custom.filter(|c| !c.is_empty()) {
        return custom.to_string();
    }
    let mut chars = type_name.chars();
    match (chars.next(), chars.next()) {
        (Some('I'), Some(second)) if second.is_uppercase() => type_name[1..].to_string(),
        _ => type_name.to_string(),
    }
}

pub fn method_wire_name(service: &str, method: &str) -> String {
    format!("{service}.{method}")
}

/// `query` for the lowest-arity overload, `query$3` for a three-parameter one.
pub fn overload_name(method: &str, arity: usize, is_lowest: bool) -> String {
    if is_lowest {
        method.to_string()
    } else {
        format!("{method}${arity}")
    }
}

pub fn subscribe_wire_name(service: &str, event: &str) -> String {
    format!("{service}.$subscribe.{}", to_camel_case(event))
}

pub fn unsubscribe_wire_name(service: &str, event: &str) -> String {
    format!("{service}.$unsubscribe.{}", to_camel_case(event))
}

pub fn event_wire_name(service: &str, event: &str) -> String {
    format!("{service}.$event.{}", to_camel_case(event))
}
