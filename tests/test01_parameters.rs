use db_tools::DbToolsError;
use db_tools::params::{ParamType, Parameter, ParametersCollection};
use db_tools::types::{ParameterDirection, RowValues};

#[test]
fn names_are_unique_and_not_blank() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = ParametersCollection::new();
    params.add_value("@name", "jobs", false)?;
    params.add(Parameter::output("@count", ParamType::Int32))?;

    assert!(matches!(
        params.add_value("@name", "again", false),
        Err(DbToolsError::ParameterError(_))
    ));
    assert!(matches!(
        params.add(Parameter::new("  ")),
        Err(DbToolsError::ParameterError(_))
    ));
    assert_eq!(params.len(), 2);
    assert!(params.contains_key("@count"));
    Ok(())
}

#[test]
fn typed_values_read_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = ParametersCollection::new();
    params.add_value("@id", 42_i32, false)?;
    params.add_value("@empty", 0_i64, true)?;
    params.add_value("@flag", true, false)?;

    assert_eq!(params.value::<i64>("@id")?, Some(42));
    assert_eq!(params.get("@id").map(|p| p.param_type), Some(ParamType::Int32));
    assert_eq!(params.value::<i64>("@empty")?, None);
    assert_eq!(params.value::<bool>("@flag")?, Some(true));
    assert!(matches!(
        params.value::<i64>("@missing"),
        Err(DbToolsError::ParameterError(_))
    ));
    Ok(())
}

#[test]
fn text_that_is_not_a_number_is_a_conversion_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = ParametersCollection::new();
    params.add_value("@name", "jobs", false)?;
    assert!(matches!(
        params.value::<i32>("@name"),
        Err(DbToolsError::ConversionError(_))
    ));
    Ok(())
}

#[test]
fn clear_forgets_names() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = ParametersCollection::new();
    params.add_value("@a", 1_i64, false)?;
    params.clear();
    assert!(params.is_empty());
    params.add_value("@a", 2_i64, false)?;
    assert_eq!(params.value::<i64>("@a")?, Some(2));
    Ok(())
}

#[test]
fn display_lists_name_value_pairs() -> Result<(), Box<dyn std::error::Error>> {
    let mut params = ParametersCollection::new();
    params.add_value("@a", 1_i64, false)?;
    params.add(Parameter::new("@b").with_direction(ParameterDirection::Output))?;
    params.add(Parameter::new("@c").with_value(RowValues::Text("x".into())))?;
    assert_eq!(params.to_string(), "@a=1;@b=;@c=x;");
    Ok(())
}
