// sample-backend/src/data.rs
use serde_json::{json, Value};

pub fn scans() -> Value {
    json!([
        {
            "process": "proc:gl:7d1f2c80-4b6e-4f0a-9c3e-1a2b3c4d5e6f",
            "isolinear_matrix": "10.0.1/24",
            "start": "2017-05-05 11:05:00",
            "stop": "2017-07-04 04:05:00",
            "schedule": {"month": "*", "dayOfWeek": "*", "hours": "*", "minutes": "*", "seconds": "*", "dayOfMonth": "*"}
        },
        {
            "process": "proc:gl:0e9a8b7c-6d5e-4f3a-2b1c-0d9e8f7a6b5c",
            "isolinear_matrix": "10.0.2/24",
            "start": "2016-02-11 08:30:00",
            "stop": "2018-11-04 04:05:00",
            "schedule": {"month": "5,6,7", "dayOfWeek": "4,5", "hours": "4", "minutes": "20", "seconds": "*", "dayOfMonth": "*"}
        }
    ])
}

pub fn schedule() -> Value {
    json!([
        {
            "id": "1",
            "status": "active",
            "job_id": "0001",
            "name": "Coolant Loop Flush",
            "description": "Flush the secondary coolant loop every Sunday at 03:15.",
            "process": "proc:gl:7d1f2c80-4b6e-4f0a-9c3e-1a2b3c4d5e6f",
            "schedule": {"minute": "15", "hour": "3", "month": "*", "year": "*", "date": "*", "day": "7"}
        },
        {
            "id": "2",
            "status": "paused",
            "job_id": "0002",
            "name": "Sensor Calibration Report",
            "description": "Compile sensor drift figures on the first of each month.",
            "process": "proc:gl:0e9a8b7c-6d5e-4f3a-2b1c-0d9e8f7a6b5c",
            "schedule": {"minute": "0", "hour": "6", "month": "*", "year": "*", "date": "1", "day": "*"}
        }
    ])
}
