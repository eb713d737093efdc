use proptest::prelude::*;

/// Event names shaped like `documents.create`
pub fn event_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("documents.create".to_string()),
        Just("documents.update".to_string()),
        Just("users.signin".to_string()),
        "[a-z]{1,8}\\.[a-z]{1,8}",
    ]
}

/// A processor's declared interest list, occasionally containing `*`
pub fn interest_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![
            4 => event_name_strategy(),
            1 => Just("*".to_string()),
        ],
        0..4,
    )
}

/// Interest lists for a handful of processors
pub fn registry_interests_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(interest_strategy(), 0..6)
}
