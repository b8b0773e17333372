use chrono::NaiveDate;
use socialgram::{
    errors::AuthError,
    models::{
        ChangeEmailRequest, Gender, LoginRequest, ProfileFields, RegisterRequest, UserResponse,
        validate_email,
    },
};

// --- Helpers ---

fn valid_registration() -> RegisterRequest {
    RegisterRequest {
        username: "alice".to_string(),
        password: "hunter22".to_string(),
        email: "alice@example.com".to_string(),
        profile: ProfileFields {
            name: "Alice".to_string(),
            surname: "Liddell".to_string(),
            description: "Down the rabbit hole".to_string(),
            profile_image: String::new(),
            gender: Gender::Female,
            birth_date: NaiveDate::from_ymd_opt(1852, 5, 4).unwrap(),
        },
    }
}

// --- Deserialization ---

#[test]
fn test_register_request_reads_flat_profile_fields() {
    let raw = r#"{
        "username": "alice",
        "password": "hunter22",
        "email": "alice@example.com",
        "name": "Alice",
        "surname": "Liddell",
        "gender": "female",
        "birth_date": "1852-05-04"
    }"#;

    let request: RegisterRequest = serde_json::from_str(raw).unwrap();

    assert_eq!(request.profile.name, "Alice");
    assert_eq!(request.profile.gender, Gender::Female);
    // Optional profile text defaults to empty.
    assert_eq!(request.profile.description, "");
    assert!(request.validate().is_ok());
}

#[test]
fn test_birth_date_accepts_date_or_rfc3339_timestamp() {
    let plain = r#"{"name":"A","surname":"B","gender":"male","birth_date":"1995-06-15"}"#;
    let stamped = r#"{"name":"A","surname":"B","gender":"male","birth_date":"1995-06-15T00:00:00Z"}"#;
    let offset = r#"{"name":"A","surname":"B","gender":"male","birth_date":"1995-06-15T23:30:00-05:00"}"#;
    let expected = NaiveDate::from_ymd_opt(1995, 6, 15).unwrap();

    for raw in [plain, stamped, offset] {
        let fields: ProfileFields = serde_json::from_str(raw).unwrap();
        assert_eq!(fields.birth_date, expected);
    }

    let garbage = r#"{"name":"A","surname":"B","gender":"male","birth_date":"15/06/1995"}"#;
    assert!(serde_json::from_str::<ProfileFields>(garbage).is_err());
}

#[test]
fn test_unknown_gender_is_rejected() {
    let raw = r#"{"name":"A","surname":"B","gender":"robot","birth_date":"2000-01-01"}"#;
    assert!(serde_json::from_str::<ProfileFields>(raw).is_err());
}

#[test]
fn test_user_response_never_carries_the_hash() {
    let response = UserResponse {
        id: 7,
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        is_admin: false,
    };

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["id"], 7);
    assert!(value.get("password_hash").is_none());
}

// --- Validation ---

#[test]
fn test_registration_field_rules() {
    assert!(valid_registration().validate().is_ok());

    let mut empty_username = valid_registration();
    empty_username.username = "   ".to_string();
    assert!(matches!(
        empty_username.validate(),
        Err(AuthError::BadRequest { .. })
    ));

    let mut long_surname = valid_registration();
    long_surname.profile.surname = "x".repeat(21);
    assert!(long_surname.validate().is_err());

    let mut long_description = valid_registration();
    long_description.profile.description = "x".repeat(256);
    assert!(long_description.validate().is_err());

    let mut max_lengths = valid_registration();
    max_lengths.profile.name = "x".repeat(20);
    max_lengths.profile.profile_image = "x".repeat(255);
    assert!(max_lengths.validate().is_ok());
}

#[test]
fn test_email_shape() {
    assert!(validate_email("a@b.co").is_ok());
    assert!(validate_email("no-at-sign").is_err());
    assert!(validate_email("@example.com").is_err());
    assert!(validate_email("a@localhost").is_err());
    assert!(validate_email("a@.example").is_err());
}

#[test]
fn test_login_and_email_change_require_fields() {
    let login = LoginRequest {
        username: "alice".to_string(),
        password: String::new(),
    };
    assert!(login.validate().is_err());

    let change = ChangeEmailRequest {
        password: "hunter22".to_string(),
        new_email: "fresh@example.com".to_string(),
    };
    assert!(change.validate().is_ok());
}

#[test]
fn test_error_status_mapping() {
    use axum::http::StatusCode;

    assert_eq!(AuthError::DuplicateIdentity.status_code(), StatusCode::CONFLICT);
    assert_eq!(AuthError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AuthError::InvalidOrExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(AuthError::NotFound.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(
        AuthError::TransientStore("redis down".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    // Backend detail stays server-side.
    assert_eq!(
        AuthError::TransientStore("redis down".to_string()).user_message(),
        "internal server error"
    );
}
