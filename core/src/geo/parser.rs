use nom::{
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{map_res, opt, recognize},
    sequence::{preceded, terminated},
    IResult, Parser,
};

use crate::error::CoordinateError;
use crate::geo::LatLng;

/// One half of a coordinate pair as written by the user.
#[derive(Debug, Clone, PartialEq)]
struct Component {
    degrees: f64,
    minutes: Option<f64>,
    seconds: Option<f64>,
    hemisphere: Option<char>,
}

impl Component {
    fn is_longitude_hemisphere(&self) -> bool {
        matches!(self.hemisphere, Some('E') | Some('W'))
    }

    fn is_latitude_hemisphere(&self) -> bool {
        matches!(self.hemisphere, Some('N') | Some('S'))
    }

    fn to_decimal(&self, axis: &str) -> Result<f64, CoordinateError> {
        for part in [self.minutes, self.seconds].into_iter().flatten() {
            if !(0.0..60.0).contains(&part) {
                return Err(CoordinateError::OutOfRange {
                    axis: format!("{axis} minutes/seconds"),
                    value: part,
                });
            }
        }
        let magnitude = self.degrees.abs()
            + self.minutes.unwrap_or(0.0) / 60.0
            + self.seconds.unwrap_or(0.0) / 3600.0;
        let negative = match self.hemisphere {
            Some('S') | Some('W') => true,
            Some(_) => false,
            None => self.degrees.is_sign_negative(),
        };
        Ok(if negative { -magnitude } else { magnitude })
    }
}

/// Parse a coordinate pair typed into the dive location field.
///
/// Accepts decimal degrees (`"25.04, -77.35"`) and degrees/minutes/seconds
/// with hemisphere letters (`"25°2'24\"N 77°21'W"`). Latitude comes first
/// unless hemisphere letters say otherwise.
pub fn parse_coordinates(input: &str) -> Result<LatLng, CoordinateError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoordinateError::Empty);
    }

    let (first, second) = match coordinate_pair(trimmed) {
        Ok((remaining, pair)) => {
            let remaining_trimmed = remaining.trim();
            if !remaining_trimmed.is_empty() {
                return Err(CoordinateError::Parse {
                    position: position_of(trimmed, remaining_trimmed),
                    message: format!("unexpected characters: '{}'", remaining_trimmed),
                });
            }
            pair
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(CoordinateError::Parse {
                position: position_of(trimmed, e.input),
                message: format!("expected a coordinate near '{}'", e.input),
            });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(CoordinateError::Parse {
                position: position_of(trimmed, ""),
                message: "incomplete coordinate".to_string(),
            });
        }
    };

    let (lat_part, lng_part) = if first.is_longitude_hemisphere() && !second.is_longitude_hemisphere()
    {
        (second, first)
    } else {
        (first, second)
    };
    if lat_part.is_longitude_hemisphere() || lng_part.is_latitude_hemisphere() {
        return Err(CoordinateError::Parse {
            position: 0,
            message: "both values name the same axis".to_string(),
        });
    }

    let lat = lat_part.to_decimal("latitude")?;
    let lng = lng_part.to_decimal("longitude")?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(CoordinateError::OutOfRange {
            axis: "latitude".to_string(),
            value: lat,
        });
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(CoordinateError::OutOfRange {
            axis: "longitude".to_string(),
            value: lng,
        });
    }
    Ok(LatLng::new(lat, lng))
}

fn position_of(input: &str, rest: &str) -> u32 {
    u32::try_from(input.len().saturating_sub(rest.len())).unwrap_or(u32::MAX)
}

fn coordinate_pair(input: &str) -> IResult<&str, (Component, Component)> {
    let (input, first) = component(input)?;
    let (input, _) = opt(preceded(multispace0, one_of(",;"))).parse(input)?;
    let (input, second) = component(input)?;
    Ok((input, (first, second)))
}

/// Plain signed decimal; no exponents, so a trailing `E` stays a hemisphere.
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize((opt(one_of("+-")), digit1, opt((char('.'), digit1)))),
        str::parse::<f64>,
    )
    .parse(input)
}

fn component(input: &str) -> IResult<&str, Component> {
    let (input, degrees) = preceded(multispace0, number).parse(input)?;
    let (input, _) = opt(preceded(multispace0, one_of("°º"))).parse(input)?;
    let (input, minutes) =
        opt(preceded(multispace0, terminated(number, one_of("'′")))).parse(input)?;
    let (input, seconds) =
        opt(preceded(multispace0, terminated(number, one_of("\"″")))).parse(input)?;
    let (input, hemisphere) = opt(preceded(multispace0, one_of("NSEWnsew"))).parse(input)?;
    Ok((
        input,
        Component {
            degrees,
            minutes,
            seconds,
            hemisphere: hemisphere.map(|h| h.to_ascii_uppercase()),
        },
    ))
}
