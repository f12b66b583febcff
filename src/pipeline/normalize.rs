//! Replaces official region names with their short display labels.

use crate::types::region::short_region_label;
use polars::prelude::*;

/// Relabels every string column of `frame` through the region catalogue.
///
/// Values that are not official region names pass through untouched, row
/// order is preserved and applying it twice is the same as applying it once.
pub fn normalize(mut frame: DataFrame) -> PolarsResult<DataFrame> {
    let string_columns: Vec<PlSmallStr> = frame
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String)
        .map(|c| c.name().clone())
        .collect();

    for name in string_columns {
        let relabeled = {
            let values = frame.column(name.as_str())?.str()?;
            let labels: Vec<Option<&str>> = values
                .into_iter()
                .map(|v| v.map(short_region_label))
                .collect();
            Series::new(name.clone(), labels)
        };
        frame.with_column(relabeled)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> PolarsResult<DataFrame> {
        df!(
            "commune" => ["Talca", "Santiago", "Región del Maule"],
            "region" => ["Región del Maule", "Región Metropolitana de Santiago", "Otra"],
            "emission_pm25" => [1.0, 2.0, 3.0]
        )
    }

    #[test]
    fn replaces_region_names_in_every_string_column() -> PolarsResult<()> {
        let out = normalize(sample()?)?;
        let regions: Vec<Option<&str>> = out.column("region")?.str()?.into_iter().collect();
        assert_eq!(regions, vec![Some("Maule"), Some("Metropolitana"), Some("Otra")]);
        let communes: Vec<Option<&str>> = out.column("commune")?.str()?.into_iter().collect();
        assert_eq!(communes, vec![Some("Talca"), Some("Santiago"), Some("Maule")]);
        assert_eq!(out.column("emission_pm25")?.f64()?.get(2), Some(3.0));
        Ok(())
    }

    #[test]
    fn is_idempotent() -> PolarsResult<()> {
        let once = normalize(sample()?)?;
        let twice = normalize(once.clone())?;
        assert!(once.equals_missing(&twice));
        Ok(())
    }

    #[test]
    fn keeps_nulls_and_empty_frames() -> PolarsResult<()> {
        let df = df!("region" => [None, Some("Región de Ñuble")])?;
        let out = normalize(df)?;
        let regions: Vec<Option<&str>> = out.column("region")?.str()?.into_iter().collect();
        assert_eq!(regions, vec![None, Some("Ñuble")]);

        let empty = normalize(df!("region" => Vec::<&str>::new())?)?;
        assert_eq!(empty.height(), 0);
        Ok(())
    }
}
