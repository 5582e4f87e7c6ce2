//! Mock API fixtures for the school directory
//!
//! Layout served by [`mount_directory_api`]:
//! - `/adms/school/`: 10 schools (ids 1..=10) over 2 pages of 5
//! - `/adms/school/1/department/`: 4 departments
//! - `/adms/school/3/department/`: HTTP 500
//! - every other school: no departments
//! - `/adms/department/{id}/course/`: 2 courses per department
//! - `/adms/department/{id}/professor/`: 1 professor per department

use serde_json::{Map, Value, json};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::API_PATH;

/// Departments served for school 1
pub const SCHOOL_ONE_DEPARTMENTS: [u64; 4] = [24542, 24543, 24544, 24547];

/// School whose department listing always fails
pub const BROKEN_SCHOOL: &str = "3";

/// Objects keyed by their id, as the API returns them
fn keyed(id_field: &str, ids: impl IntoIterator<Item = u64>, extra: impl Fn(u64) -> Value) -> Value {
    let map: Map<String, Value> = ids
        .into_iter()
        .map(|id| {
            let mut object = Map::new();
            object.insert(id_field.to_string(), json!(id));
            if let Value::Object(more) = extra(id) {
                object.extend(more);
            }
            (id.to_string(), Value::Object(object))
        })
        .collect();
    Value::Object(map)
}

/// One page of the school listing
pub fn school_page(page: u64) -> Value {
    let first = (page - 1) * 5 + 1;
    json!({
        "result": {
            "School": keyed("school_id", first..first + 5, |id| json!({"name": format!("School {id}")}))
        },
        "pagination": {"results": 10, "page": page, "pages": 2, "per_page": 5}
    })
}

/// Departments of school 1
pub fn department_response() -> Value {
    json!({
        "result": {
            "Department": keyed("department_id", SCHOOL_ONE_DEPARTMENTS, |_| json!({"school_id": 1}))
        }
    })
}

fn course_response(department_id: u64) -> Value {
    json!({
        "result": {
            "Course": keyed("course_id", [department_id * 10 + 1, department_id * 10 + 2], move |_| {
                json!({"department_id": department_id})
            })
        }
    })
}

fn professor_response(department_id: u64) -> Value {
    json!({
        "result": {
            "Professor": [{"professor_id": department_id + 900_000, "department_id": department_id}]
        }
    })
}

/// Mount the whole directory API on `server`
pub async fn mount_directory_api(server: &MockServer) {
    for page in 1..=2u64 {
        Mock::given(method("GET"))
            .and(path(format!("{API_PATH}/school/")))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(school_page(page)))
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/school/1/department/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(department_response()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/school/{BROKEN_SCHOOL}/department/")))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/adms/school/\d+/department/$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;

    for department_id in SCHOOL_ONE_DEPARTMENTS {
        Mock::given(method("GET"))
            .and(path(format!("{API_PATH}/department/{department_id}/course/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(course_response(department_id)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!(
                "{API_PATH}/department/{department_id}/professor/"
            )))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(professor_response(department_id)),
            )
            .mount(server)
            .await;
    }
}

/// Count requests whose path matches `path`
pub async fn requests_to(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}
