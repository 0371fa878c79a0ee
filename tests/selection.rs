use std::cell::RefCell;
use std::rc::Rc;

use kpdf_highlights::selection::NoopFeedback;
use kpdf_highlights::{
    CompletedSelection, DocumentId, HighlightColor, HighlightSession, HighlightsConfig, PageFrame,
    PersistenceGateway, Point, Rect, RenderSurface, SledHighlightStore, StandardConfidenceMapper,
};

/// 400x200 page drawn at (50,25) inside a 500x300 viewer.
struct Viewer;

impl RenderSurface for Viewer {
    fn current_page_index(&self) -> usize {
        3
    }

    fn page_frame(&self) -> Option<PageFrame> {
        Some(PageFrame {
            frame: Rect::sized(400.0, 200.0),
            offset: Point::new(50.0, 25.0),
        })
    }
}

fn session() -> Rc<HighlightSession> {
    let gateway = PersistenceGateway::new(
        Rc::new(SledHighlightStore::open_temporary().unwrap()),
        Rc::new(StandardConfidenceMapper),
        Default::default(),
    );
    Rc::new(HighlightSession::new(
        gateway,
        Rc::new(Viewer),
        &HighlightsConfig::default(),
    ))
}

#[tokio::test]
async fn drag_in_viewer_becomes_page_percentages() {
    let session = session();
    let completed = Rc::new(RefCell::new(Vec::<CompletedSelection>::new()));
    let sink = completed.clone();
    let mut gesture = session.new_gesture(Box::new(NoopFeedback));
    gesture.on_complete(move |selection| sink.borrow_mut().push(*selection));

    gesture.begin(Point::new(100.0, 100.0));
    gesture.update(Point::new(130.0, 120.0));
    let selection = gesture.end(Point::new(150.0, 130.0)).unwrap();
    assert_eq!(completed.borrow().len(), 1);

    let doc = DocumentId::from("score.pdf");
    let geometry = session
        .record_selection(&doc, &selection, HighlightColor::Yellow)
        .await
        .unwrap()
        .unwrap();

    let pct = geometry.percent_rect();
    assert!((pct.x_pct - 0.125).abs() < 1e-6);
    assert!((pct.y_pct - 0.375).abs() < 1e-6);
    assert!((pct.w_pct - 0.125).abs() < 1e-6);
    assert!((pct.h_pct - 0.15).abs() < 1e-6);
    assert_eq!(geometry.page(), Some(3));

    let reloaded = session.gateway().load(&doc).await.unwrap();
    assert_eq!(reloaded, vec![geometry]);
}

#[tokio::test]
async fn disabling_mid_drag_creates_nothing() {
    let session = session();
    let mut gesture = session.new_gesture(Box::new(NoopFeedback));
    let fired = Rc::new(RefCell::new(0));
    let counter = fired.clone();
    gesture.on_complete(move |_| *counter.borrow_mut() += 1);

    gesture.begin(Point::new(100.0, 100.0));
    gesture.update(Point::new(200.0, 200.0));
    gesture.disable();
    assert!(gesture.end(Point::new(200.0, 200.0)).is_none());
    assert!(!gesture.begin(Point::new(0.0, 0.0)));
    assert_eq!(*fired.borrow(), 0);

    let doc = DocumentId::from("score.pdf");
    assert!(session.gateway().load(&doc).await.unwrap().is_empty());
}

#[tokio::test]
async fn click_without_drag_is_not_a_highlight() {
    let session = session();
    let mut gesture = session.new_gesture(Box::new(NoopFeedback));

    gesture.begin(Point::new(0.0, 0.0));
    assert!(gesture.end(Point::new(1.0, 1.0)).is_none());

    gesture.begin(Point::new(0.0, 0.0));
    assert!(gesture.end(Point::new(10.0, 10.0)).is_some());
}
