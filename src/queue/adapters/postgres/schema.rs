//! Diesel schema for queued task persistence.

diesel::table! {
    /// Queued task records.
    queued_tasks (id) {
        /// Store-assigned task identifier.
        id -> Int8,
        /// Task title.
        #[max_length = 255]
        title -> Varchar,
        /// Queue name; empty for the default queue.
        #[max_length = 100]
        queue_name -> Varchar,
        /// Lifecycle state.
        #[max_length = 50]
        state -> Varchar,
        /// Execution outcome.
        #[max_length = 50]
        outcome -> Varchar,
        /// Operation name.
        #[max_length = 100]
        method_name -> Varchar,
        /// Delegated service name for service-delegating tasks.
        #[max_length = 100]
        service_name -> Nullable<Varchar>,
        /// Operation arguments.
        arguments -> Jsonb,
        /// Earliest run time.
        event_date -> Timestamptz,
        /// Last time the task entered the queue.
        queued_date -> Timestamptz,
        /// Last claim time.
        start_date -> Nullable<Timestamptz>,
        /// Time the task reached a halt state.
        end_date -> Nullable<Timestamptz>,
        /// Soft-archive time.
        archived_date -> Nullable<Timestamptz>,
        /// External subject record.
        model_ref -> Nullable<Int8>,
        /// Scheduling priority.
        priority -> Int4,
        /// Execution budget in seconds.
        timeout_secs -> Nullable<Int8>,
        /// Enqueuer identity.
        #[max_length = 255]
        queued_by -> Nullable<Varchar>,
        /// Result message.
        message -> Nullable<Text>,
    }
}
