use crate::error::{CollageError, Result};
use crate::model::{Rect, ShapeKind, Template, TemplateType};
use std::collections::HashSet;

/// Smallest and largest procedurally generated square grid.
pub const GRID_SIDES: std::ops::RangeInclusive<u32> = 2..=10;

/// Immutable, ordered list of the templates offered to the user.
///
/// Built once and shared (typically behind an `Arc`) with every editing session.
/// Lookups go by stable id, by display position or by name.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// Builds a catalog from explicit templates, validating each one and rejecting duplicate ids.
    pub fn new(templates: Vec<Template>) -> Result<Self> {
        if templates.is_empty() {
            return Err(CollageError::InvalidInput("template catalog is empty".into()));
        }
        let mut seen = HashSet::with_capacity(templates.len());
        for t in &templates {
            t.validate()?;
            if !seen.insert(t.id) {
                return Err(CollageError::DuplicateTemplateId(t.id));
            }
        }
        Ok(Self { templates })
    }

    /// The stock catalog: square grids 2x2..10x10 followed by the fixed shapes.
    pub fn builtin() -> Result<Self> {
        let mut templates: Vec<Template> = GRID_SIDES.map(square_grid).collect();
        templates.extend(fixed_templates());
        Self::new(templates)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Template shown first; the catalog is never empty.
    pub fn default_template(&self) -> &Template {
        &self.templates[0]
    }

    pub fn get(&self, id: u32) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn at(&self, position: usize) -> Option<&Template> {
        self.templates.get(position)
    }

    pub fn position_of(&self, id: u32) -> Option<usize> {
        self.templates.iter().position(|t| t.id == id)
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// `n x n` grid with id `n` and its fractional cells listed row-major.
pub fn square_grid(n: u32) -> Template {
    let step = 1.0 / n as f64;
    let layout = (0..n * n)
        .map(|i| {
            Rect::new(
                (i % n) as f64 * step,
                (i / n) as f64 * step,
                step,
                step,
            )
        })
        .collect();
    Template::new(
        n,
        format!("Grid {n}x{n}"),
        TemplateType::Grid {
            rows: n,
            columns: n,
        },
        layout,
    )
}

fn shape(id: u32, kind: ShapeKind) -> Template {
    Template::new(id, kind.name(), TemplateType::Shape { shape: kind }, Vec::new())
}

fn fixed_templates() -> Vec<Template> {
    let strips = |vertical: bool| -> Vec<Rect> {
        (0..4)
            .map(|i| {
                let at = i as f64 * 0.25;
                if vertical {
                    Rect::new(at, 0.0, 0.25, 1.0)
                } else {
                    Rect::new(0.0, at, 1.0, 0.25)
                }
            })
            .collect()
    };
    vec![
        Template::new(110, "Freeform", TemplateType::Freeform, Vec::new()),
        Template::new(101, "Vertical Strips", TemplateType::Mosaic, strips(true)),
        Template::new(102, "Horizontal Strips", TemplateType::Mosaic, strips(false)),
        shape(103, ShapeKind::Star),
        shape(104, ShapeKind::Triangle),
        shape(105, ShapeKind::Diamond),
        Template::new(
            106,
            "L-shape",
            TemplateType::Mosaic,
            vec![
                Rect::new(0.0, 0.0, 0.5, 0.5),
                Rect::new(0.5, 0.0, 0.5, 0.25),
                Rect::new(0.5, 0.25, 0.25, 0.25),
            ],
        ),
        Template::new(
            107,
            "Cross",
            TemplateType::Mosaic,
            vec![Rect::new(0.4, 0.0, 0.2, 1.0), Rect::new(0.0, 0.4, 1.0, 0.2)],
        ),
        Template::new(108, "Circle", TemplateType::Circle, Vec::new()),
        Template::new(
            109,
            "Mosaic",
            TemplateType::Mosaic,
            vec![
                Rect::new(0.0, 0.0, 0.6, 0.4),
                Rect::new(0.6, 0.0, 0.4, 0.4),
                Rect::new(0.0, 0.4, 0.4, 0.6),
                Rect::new(0.4, 0.4, 0.6, 0.6),
            ],
        ),
        shape(201, ShapeKind::Heart),
        shape(202, ShapeKind::Flower),
        shape(210, ShapeKind::Spiral),
    ]
}
