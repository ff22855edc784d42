use unicode_width::UnicodeWidthStr;

use crate::field::collation_name;
use crate::limits::COLL_NONE;
use crate::space_def::SpaceDef;

const HEADERS: [&str; 7] = ["#", "name", "type", "nullable", "action", "collation", "default"];

pub struct TextRenderer {
    pub column_gap: usize,
    pub indent: usize,
    pub empty_cell: &'static str,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            column_gap: 2,
            indent: 2,
            empty_cell: "-",
        }
    }
}

impl TextRenderer {
    pub fn render(&self, def: &SpaceDef) -> String {
        let mut out = format!(
            "space '{}' (id {}, owner {}, engine {})\n",
            def.name(),
            def.id(),
            def.uid(),
            def.engine_name()
        );

        let opts = def.opts();
        let mut flags = Vec::new();
        if opts.temporary {
            flags.push("temporary".to_string());
        }
        if opts.is_view {
            flags.push("view".to_string());
        }
        if def.exact_field_count() != 0 {
            flags.push(format!("field_count={}", def.exact_field_count()));
        }
        if !flags.is_empty() {
            out.push_str(&format!("options: {}\n", flags.join(", ")));
        }
        if let Some(sql) = &opts.sql {
            out.push_str(&format!("sql: {sql}\n"));
        }

        if def.field_count() > 0 {
            let rows: Vec<Vec<String>> = def
                .fields()
                .enumerate()
                .map(|(i, field)| {
                    let collation = match field.coll_id() {
                        COLL_NONE => self.empty_cell.to_string(),
                        id => collation_name(id).map_or_else(|| id.to_string(), str::to_string),
                    };
                    vec![
                        (i + 1).to_string(),
                        field.name().to_string(),
                        field.field_type().to_string(),
                        if field.is_nullable() { "yes" } else { "no" }.to_string(),
                        field.nullable_action().to_string(),
                        collation,
                        field.default_value().unwrap_or(self.empty_cell).to_string(),
                    ]
                })
                .collect();
            self.table(&mut out, &rows);
        }

        if let Some(checks) = &opts.checks {
            out.push_str("checks:\n");
            for check in checks.iter() {
                let name = check.name.as_deref().unwrap_or(self.empty_cell);
                out.push_str(&format!("{}{name}: {}\n", " ".repeat(self.indent), check.expr_text));
            }
        }
        out
    }

    fn table(&self, out: &mut String, rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.width()).collect();
        for row in rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.width());
            }
        }
        let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
        self.row(out, &header, &widths);
        for row in rows {
            self.row(out, row, &widths);
        }
    }

    fn row(&self, out: &mut String, cells: &[String], widths: &[usize]) {
        let mut line = " ".repeat(self.indent);
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            line.push_str(cell);
            if i + 1 < cells.len() {
                line.push_str(&" ".repeat(width - cell.width() + self.column_gap));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

/// Render with the default settings.
pub fn render_space(def: &SpaceDef) -> String {
    TextRenderer::default().render(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDef, FieldType};
    use crate::space_opts::SpaceOpts;

    #[test]
    fn test_render_table() {
        let fields = vec![
            FieldDef::new("id", FieldType::Unsigned),
            FieldDef::new("name", FieldType::String).with_collation(1).nullable(),
        ];
        let opts = SpaceOpts {
            temporary: true,
            ..SpaceOpts::default()
        };
        let def = SpaceDef::new(512, 1, 0, "users", "memtx", &opts, &fields).unwrap();
        let text = render_space(&def);
        let expected = "\
space 'users' (id 512, owner 1, engine memtx)
options: temporary
  #  name  type      nullable  action   collation  default
  1  id    unsigned  no        default  -          -
  2  name  string    yes       none     unicode    -
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_wide_names_align() {
        let fields = vec![
            FieldDef::new("名前", FieldType::String),
            FieldDef::new("id", FieldType::Unsigned),
        ];
        let def = SpaceDef::new(1, 1, 0, "t", "memtx", &SpaceOpts::default(), &fields).unwrap();
        let text = render_space(&def);
        let lines: Vec<&str> = text.lines().collect();
        // "名前" is four columns wide, same as "name"
        assert_eq!(lines[1], "  #  name  type      nullable  action   collation  default");
        assert_eq!(lines[2], "  1  名前  string    no        default  -          -");
        assert_eq!(lines[3], "  2  id    unsigned  no        default  -          -");
    }

    #[test]
    fn test_empty_space() {
        let def = SpaceDef::new(7, 0, 0, "empty", "vinyl", &SpaceOpts::default(), &[]).unwrap();
        assert_eq!(render_space(&def), "space 'empty' (id 7, owner 0, engine vinyl)\n");
    }
}
