//! Reading and writing geometries in Well-Known Text.
//!
//! Supported tags are `POINT`, `LINESTRING`, `POLYGON` and their `MULTI` variants. Multi-geometries
//! are split into their parts, since a feature can hold any number of geometries.

use std::fmt::Write;

use crate::cartesian::Point2;
use crate::geometry::{Geometry, Polygon};
use crate::TypesError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> Result<Vec<Token>, TypesError> {
    let mut tokens = vec![];
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Word(text[start..end].to_ascii_uppercase()));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let value = text[start..end]
                    .parse()
                    .map_err(|_| error(format!("invalid number '{}'", &text[start..end])))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(error(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

fn error(message: String) -> TypesError {
    TypesError::Conversion(message)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn expect(&mut self, expected: Token) -> Result<(), TypesError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(error(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn number(&mut self) -> Result<f64, TypesError> {
        match self.next() {
            Some(Token::Number(v)) => Ok(v),
            other => Err(error(format!("expected number, got {other:?}"))),
        }
    }

    fn point(&mut self) -> Result<Point2, TypesError> {
        let x = self.number()?;
        let y = self.number()?;
        // Z and M values are dropped.
        while let Some(Token::Number(_)) = self.peek() {
            self.next();
        }
        Ok(Point2::new(x, y))
    }

    fn list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, TypesError>,
    ) -> Result<Vec<T>, TypesError> {
        if self.peek() == Some(&Token::Word("EMPTY".into())) {
            self.next();
            return Ok(vec![]);
        }

        self.expect(Token::Open)?;
        let mut items = vec![item(self)?];
        while self.peek() == Some(&Token::Comma) {
            self.next();
            items.push(item(self)?);
        }
        self.expect(Token::Close)?;
        Ok(items)
    }

    fn multi_point_item(&mut self) -> Result<Point2, TypesError> {
        // Both `MULTIPOINT(1 2, 3 4)` and `MULTIPOINT((1 2), (3 4))` are in use.
        if self.peek() == Some(&Token::Open) {
            self.next();
            let point = self.point()?;
            self.expect(Token::Close)?;
            Ok(point)
        } else {
            self.point()
        }
    }

    fn polygon(&mut self) -> Result<Polygon, TypesError> {
        let mut rings = self.list(|p| p.list(Self::point))?.into_iter();
        let outer = rings.next().unwrap_or_default();
        Ok(Polygon::new(outer, rings.collect()))
    }

    fn geometries(&mut self) -> Result<Vec<Geometry>, TypesError> {
        let tag = match self.next() {
            Some(Token::Word(tag)) => tag,
            other => return Err(error(format!("expected geometry tag, got {other:?}"))),
        };

        Ok(match tag.as_str() {
            "POINT" => self.list(Self::point)?.into_iter().map(Geometry::Point).collect(),
            "LINESTRING" => {
                let points = self.list(Self::point)?;
                if points.is_empty() {
                    vec![]
                } else {
                    vec![Geometry::LineString(points)]
                }
            }
            "POLYGON" => {
                let polygon = self.polygon()?;
                if polygon.outer.is_empty() {
                    vec![]
                } else {
                    vec![Geometry::Polygon(polygon)]
                }
            }
            "MULTIPOINT" => self
                .list(Self::multi_point_item)?
                .into_iter()
                .map(Geometry::Point)
                .collect(),
            "MULTILINESTRING" => self
                .list(|p| p.list(Self::point))?
                .into_iter()
                .map(Geometry::LineString)
                .collect(),
            "MULTIPOLYGON" => self
                .list(Self::polygon)?
                .into_iter()
                .map(Geometry::Polygon)
                .collect(),
            other => return Err(error(format!("unsupported geometry type {other}"))),
        })
    }
}

/// Parses a WKT string into a list of geometries.
pub fn parse(text: &str) -> Result<Vec<Geometry>, TypesError> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        position: 0,
    };
    let geometries = parser.geometries()?;
    if parser.position < parser.tokens.len() {
        return Err(error(format!("trailing input in '{text}'")));
    }

    Ok(geometries)
}

fn write_points(out: &mut String, points: impl Iterator<Item = Point2>) {
    out.push('(');
    for (i, p) in points.enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{} {}", p.x, p.y);
    }
    out.push(')');
}

fn write_ring(out: &mut String, ring: &[Point2]) {
    // Rings are stored open, WKT wants them closed.
    write_points(out, ring.iter().chain(ring.first()).copied());
}

/// Writes a geometry as WKT.
pub fn write(geometry: &Geometry) -> String {
    let mut out = String::new();
    match geometry {
        Geometry::Point(p) => {
            out.push_str("POINT");
            write_points(&mut out, std::iter::once(*p));
        }
        Geometry::LineString(points) => {
            out.push_str("LINESTRING");
            write_points(&mut out, points.iter().copied());
        }
        Geometry::Polygon(polygon) => {
            out.push_str("POLYGON(");
            for (i, ring) in polygon.rings().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_ring(&mut out, ring);
            }
            out.push(')');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_simple() {
        assert_eq!(
            parse("POINT (30 10)").unwrap(),
            vec![Geometry::Point(Point2::new(30.0, 10.0))]
        );
        assert_eq!(
            parse("linestring(0 0, 1.5 -2e1)").unwrap(),
            vec![Geometry::LineString(vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.5, -20.0)
            ])]
        );

        let polygon = parse("POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0), (1 1, 2 1, 2 2, 1 1))").unwrap();
        assert_matches!(&polygon[..], [Geometry::Polygon(p)] if p.outer.len() == 4 && p.inner.len() == 1);
    }

    #[test]
    fn multi_geometries_are_split() {
        assert_eq!(parse("MULTIPOINT ((10 40), (40 30))").unwrap().len(), 2);
        assert_eq!(parse("MULTIPOINT (10 40, 40 30, 20 20)").unwrap().len(), 3);
        assert_eq!(
            parse("MULTIPOLYGON (((30 20, 45 40, 10 40, 30 20)), ((15 5, 40 10, 10 20, 5 10, 15 5)))")
                .unwrap()
                .len(),
            2
        );
        assert!(parse("POINT EMPTY").unwrap().is_empty());
    }

    #[test]
    fn invalid_input() {
        assert_matches!(parse("CIRCLE(1 2)"), Err(TypesError::Conversion(_)));
        assert_matches!(parse("POINT(1)"), Err(TypesError::Conversion(_)));
        assert_matches!(parse("POINT(1 2) extra"), Err(TypesError::Conversion(_)));
        assert_matches!(parse("POINT(1 2"), Err(TypesError::Conversion(_)));
    }

    #[test]
    fn write_closes_rings() {
        let geometry = &parse("POLYGON((0 0, 1 0, 1 1))").unwrap()[0];
        assert_eq!(geometry.to_wkt(), "POLYGON((0 0,1 0,1 1,0 0))");
        assert_eq!(
            Geometry::Point(Point2::new(1.5, -2.0)).to_wkt(),
            "POINT(1.5 -2)"
        );
    }
}
