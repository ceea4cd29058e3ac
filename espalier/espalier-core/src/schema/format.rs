use std::fmt::{Error, Result, Write as _};

use super::node::SchemaNode;

/// Format a schema tree in a readable style:
/// primitive nodes are rendered in one line, compound nodes are
/// pretty-printed with their array names. Nested nodes follow the same
/// rule.
pub fn format_node(node: &SchemaNode) -> std::result::Result<String, Error> {
    let mut out = String::new();
    format_body(node, 0, &mut out)?;
    Ok(out)
}

fn format_body(node: &SchemaNode, indent: usize, out: &mut String) -> Result {
    let pad = " ".repeat(indent);
    writeln!(out, "{pad}type: {}", node.kind_name())?;

    match node {
        SchemaNode::Primitive { dtype, data } => {
            writeln!(out, "{pad}dtype: {dtype}")?;
            writeln!(out, "{pad}data: {data}")?;
        }
        SchemaNode::List {
            starts,
            stops,
            item,
        } => {
            writeln!(out, "{pad}starts: {starts}")?;
            writeln!(out, "{pad}stops: {stops}")?;
            format_labeled("item", item, indent, out)?;
        }
        SchemaNode::Record { fields } => {
            writeln!(out, "{pad}fields:")?;
            for field in fields {
                format_labeled(&field.name, &field.node, indent + 4, out)?;
            }
        }
        SchemaNode::Union {
            tags,
            offsets,
            variants,
        } => {
            writeln!(out, "{pad}tags: {tags}")?;
            writeln!(out, "{pad}offsets: {offsets}")?;
            writeln!(out, "{pad}variants:")?;
            for (tag, variant) in variants.iter().enumerate() {
                format_labeled(&tag.to_string(), variant, indent + 4, out)?;
            }
        }
        SchemaNode::Pointer {
            positions,
            mask,
            target,
        } => {
            writeln!(out, "{pad}positions: {positions}")?;
            if let Some(mask) = mask {
                writeln!(out, "{pad}mask: {mask}")?;
            }
            format_labeled("target", target, indent, out)?;
        }
    }

    Ok(())
}

fn format_labeled(label: &str, node: &SchemaNode, indent: usize, out: &mut String) -> Result {
    let pad = " ".repeat(indent);
    if let SchemaNode::Primitive { dtype, data } = node {
        writeln!(out, "{pad}{label}: {{ type: primitive, dtype: {dtype}, data: {data} }}")?;
    } else {
        writeln!(out, "{pad}{label}:")?;
        format_body(node, indent + 4, out)?;
    }
    Ok(())
}
