use std::collections::HashMap;

pub struct DataModelUtilities;

impl DataModelUtilities {
    pub fn get_representation_parameter_string(
        parameters: &Option<HashMap<String, String>>,
    ) -> Option<String> {
        match parameters {
            Some(value) => {
                let mut serialized_parameters = value
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect::<Vec<String>>();

                serialized_parameters.sort();

                let parameters_string = format!("({})", serialized_parameters.join(","));

                Some(parameters_string)
            }
            None => None,
        }
    }
}
