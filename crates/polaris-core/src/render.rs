//! HTML projection of an annotation.
//!
//! Plain segments become escaped text; annotated segments become links that
//! carry the entity id and kind a viewer needs for "find usages" and
//! highlight grouping.

use std::fmt::Write;

use crate::annotate::{Annotation, Segment};
use crate::link::source_url;
use crate::text::{escape_html, line_count};
use crate::types::Usage;

/// Render `annotation` as HTML for a `<pre>` code column.
pub fn render_html(annotation: &Annotation<'_>) -> String {
    let mut out = String::new();
    for segment in &annotation.segments {
        match *segment {
            Segment::Plain { text } => out.push_str(&escape_html(text)),
            Segment::Annotated { text, usage } => push_usage(&mut out, text, usage),
        }
    }
    out
}

fn push_usage(out: &mut String, text: &str, usage: &Usage) {
    let kind = usage.kind.as_str();
    let href = escape_html(&source_url(usage.navigation_target()));
    // Writing to a String cannot fail.
    let _ = write!(
        out,
        "<a class=\"usage usage-{}\" data-kind=\"{}\"",
        kind.to_ascii_lowercase(),
        kind
    );
    if let Some(id) = usage.entity_id {
        let _ = write!(out, " data-entity-id=\"{}\"", id);
    }
    let _ = write!(out, " href=\"{}\">{}</a>", href, escape_html(text));
}

/// Line numbers (1-based) for the gutter next to `source`.
pub fn gutter(source: &str) -> Vec<usize> {
    (1..=line_count(source)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::position::Span;
    use crate::types::{EntityId, FileHandle, FileId, FileKind, JumpTarget, UsageKind};

    fn usage(from: u32, to: u32, entity: Option<i64>, definition: bool) -> Usage {
        let file = FileHandle::new("p", "/Foo.java", FileId(1), FileKind::NormalFile);
        Usage {
            span: Span::on_line(0, from, to),
            kind: UsageKind::Type,
            entity_id: entity.map(EntityId),
            jump_target: JumpTarget::new(file.clone(), None),
            definition_jump_target: definition
                .then(|| JumpTarget::new(file, Some(Span::on_line(3, 0, 3)))),
        }
    }

    #[test]
    fn plain_text_is_escaped() {
        let source = "a < b && c";
        let annotation = annotate(source, &[]).unwrap();
        assert_eq!(render_html(&annotation), "a &lt; b &amp;&amp; c");
    }

    #[test]
    fn usages_become_links() {
        let source = "int x = Foo.bar();";
        let usages = vec![usage(0, 3, None, false), usage(8, 11, Some(42), true)];
        let annotation = annotate(source, &usages).unwrap();
        assert_eq!(
            render_html(&annotation),
            "int x = <a class=\"usage usage-type\" data-kind=\"TYPE\" \
             data-entity-id=\"42\" href=\"p/Foo.java?line=3\">Foo</a>.bar();"
        );
    }

    #[test]
    fn link_falls_back_to_jump_target() {
        let source = "Foo";
        let usages = vec![usage(0, 3, Some(1), false)];
        let annotation = annotate(source, &usages).unwrap();
        assert!(render_html(&annotation).contains("href=\"p/Foo.java\""));
    }

    #[test]
    fn gutter_numbers_lines() {
        assert_eq!(gutter(""), Vec::<usize>::new());
        assert_eq!(gutter("a\nb"), vec![1, 2]);
        assert_eq!(gutter("a\nb\n"), vec![1, 2]);
    }
}
