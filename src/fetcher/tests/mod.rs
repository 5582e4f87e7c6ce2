
use serde_json::{Value, json};

/// Four departments of school 206, keyed by id like the real API
fn department_response() -> Value {
    json!({
        "result": {
            "Department": {
                "24542": {"department_id": 24542, "school_id": 206, "name": "Accounting"},
                "24543": {"department_id": 24543, "school_id": 206, "name": "Biology"},
                "24544": {"department_id": 24544, "school_id": 206, "name": "Chemistry"},
                "24547": {"department_id": 24547, "school_id": 206, "name": "Drama"}
            }
        }
    })
}

/// One page of `per_page` schools starting at `first_id`
fn school_page(first_id: u64, per_page: u64, pages: Option<u64>) -> Value {
    let schools: serde_json::Map<String, Value> = (first_id..first_id + per_page)
        .map(|id| {
            (
                id.to_string(),
                json!({"school_id": id, "name": format!("School {id}")}),
            )
        })
        .collect();

    let mut body = json!({"result": {"School": schools}});
    if let Some(pages) = pages {
        body["pagination"] = json!({
            "results": pages * per_page,
            "page": 1,
            "pages": pages,
            "per_page": per_page
        });
    }
    body
}
