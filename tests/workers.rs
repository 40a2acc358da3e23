mod helpers;

mod workers {
    mod cluster_event;
    mod match_guest;
    mod sync_event;
}
