//! Text rendering for the core builders. Pure functions of the IR.

use crate::builtin::DEFAULT_CAPABILITY;
use crate::ir::{IrData, IrResource};

/// Lowercase, `[a-z0-9]` runs joined by single dashes
pub fn sanitize_namespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// `acme-demo` -> `AcmeDemo`
pub fn pascal_case(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `book-reviews` -> `bookReviews`
pub fn camel_case(raw: &str) -> String {
    let pascal = pascal_case(raw);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn php_controller_file(resource: &str) -> String {
    format!("Rest/{}Controller.php", pascal_case(resource))
}

pub fn ts_client_file(resource: &str) -> String {
    format!("{}.ts", camel_case(resource))
}

/// Capability a resource resolves to, falling back to the default
pub fn resolved_capability<'a>(data: &'a IrData, resource: &IrResource) -> &'a str {
    resource
        .capability
        .as_ref()
        .and_then(|key| data.capability_map.entries.get(key))
        .map(|entry| entry.capability.as_str())
        .unwrap_or(DEFAULT_CAPABILITY)
}

fn php_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn php_controller(data: &IrData, resource: &IrResource) -> String {
    let namespace = pascal_case(&data.meta.sanitized_namespace);
    let class = format!("{}Controller", pascal_case(&resource.name));
    format!(
        "<?php\n\
         // Generated by genpipe {version}. Do not edit.\n\
         declare(strict_types=1);\n\
         \n\
         namespace {namespace}\\Rest;\n\
         \n\
         final class {class}\n\
         {{\n\
         \x20   public const ROUTE = '{route}';\n\
         \x20   public const CAPABILITY = '{capability}';\n\
         \n\
         \x20   public function permission_check(): bool\n\
         \x20   {{\n\
         \x20       return current_user_can(self::CAPABILITY);\n\
         \x20   }}\n\
         }}\n",
        version = data.meta.version,
        namespace = namespace,
        class = class,
        route = php_quote(&resource.route),
        capability = php_quote(resolved_capability(data, resource)),
    )
}

pub fn ts_client(data: &IrData, resource: &IrResource) -> String {
    let name = camel_case(&resource.name);
    let type_name = pascal_case(&resource.name);
    let route = serde_json::Value::String(resource.route.clone()).to_string();
    format!(
        "// Generated by genpipe {version}. Do not edit.\n\
         export const {name}Route = {route};\n\
         \n\
         export async function fetch{type_name}(init?: RequestInit): Promise<Response> {{\n\
         \x20 return fetch({name}Route, init);\n\
         }}\n",
        version = data.meta.version,
        name = name,
        route = route,
        type_name = type_name,
    )
}
